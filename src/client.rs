//! Terminal client for playing against another connected participant.
//!
//! [`ClientView`] tracks what the server has told us and decides when to
//! ask the user for a move; [`play`] wires it to a TCP connection and the
//! terminal.

use crate::games::tictactoe::{Board, Mark, Position};
use crate::protocol::{ClientCommand, OPPONENT_DISCONNECTED, ServerMessage, YOUR_TURN};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};
use tokio::net::TcpStream;
use tracing::{debug, info, instrument, warn};

/// What the terminal should do after a server line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientAction {
    /// Nothing to ask; keep reading.
    Wait,
    /// It is our turn (again): ask for a cell.
    AskMove,
    /// The game ended with this outcome line.
    Finished(ServerMessage),
    /// The opponent left before the game was decided.
    Abandoned,
}

/// Local mirror of the game, built only from server messages.
#[derive(Debug, Clone, Default)]
pub struct ClientView {
    mark: Option<Mark>,
    board: Board,
    pending: Option<usize>,
    opponent_just_moved: bool,
}

impl ClientView {
    /// Creates an empty view.
    pub fn new() -> Self {
        Self::default()
    }

    /// Our mark, once welcomed.
    pub fn mark(&self) -> Option<Mark> {
        self.mark
    }

    /// Board as we know it.
    pub fn board(&self) -> &Board {
        &self.board
    }

    /// Remembers the cell we just asked for, until the server answers.
    pub fn move_sent(&mut self, cell: usize) {
        self.pending = Some(cell);
    }

    fn mark_cell(&mut self, cell: usize, mark: Mark) {
        match Position::from_index(cell) {
            Some(pos) if self.board.is_empty(pos) => self.board.occupy(pos, mark),
            _ => warn!(cell, "Server reported an impossible cell"),
        }
    }

    /// Applies one server line.
    #[instrument(skip(self))]
    pub fn apply(&mut self, msg: &ServerMessage) -> ClientAction {
        match msg {
            ServerMessage::Welcome(mark) => {
                self.mark = Some(*mark);
                ClientAction::Wait
            }
            ServerMessage::Message(text) if text == YOUR_TURN => ClientAction::AskMove,
            ServerMessage::Message(text) if text == OPPONENT_DISCONNECTED => ClientAction::Abandoned,
            ServerMessage::Message(_) => {
                // A message while a move is pending is its rejection.
                if self.pending.take().is_some() {
                    ClientAction::AskMove
                } else {
                    ClientAction::Wait
                }
            }
            ServerMessage::ValidMove => {
                if let (Some(cell), Some(mark)) = (self.pending.take(), self.mark) {
                    self.mark_cell(cell, mark);
                }
                ClientAction::Wait
            }
            ServerMessage::OpponentMoved(cell) => {
                if let Some(mark) = self.mark {
                    self.mark_cell(*cell, mark.opponent());
                }
                self.opponent_just_moved = true;
                ClientAction::Wait
            }
            ServerMessage::Continue => {
                if std::mem::take(&mut self.opponent_just_moved) {
                    ClientAction::AskMove
                } else {
                    ClientAction::Wait
                }
            }
            ServerMessage::Victory | ServerMessage::Defeat | ServerMessage::Tie => {
                ClientAction::Finished(msg.clone())
            }
        }
    }
}

fn write_text<W: Write>(out: &mut W, text: &str) -> std::io::Result<()> {
    out.write_all(text.as_bytes())?;
    out.flush()
}

fn show(text: &str) -> std::io::Result<()> {
    write_text(&mut std::io::stdout().lock(), text)
}

/// Reads one line from the terminal; `None` on end of input.
async fn ask(stdin: &mut Lines<BufReader<Stdin>>, prompt: &str) -> std::io::Result<Option<String>> {
    show(prompt)?;
    Ok(stdin.next_line().await?.map(|l| l.trim().to_string()))
}

/// Plays one game. Returns false if the user quit.
async fn play_round(addr: &str, stdin: &mut Lines<BufReader<Stdin>>) -> std::io::Result<bool> {
    let stream = TcpStream::connect(addr).await?;
    info!(%addr, "Connected");
    let (read_half, mut write_half) = stream.into_split();
    let mut server = BufReader::new(read_half).lines();
    let mut view = ClientView::new();

    while let Some(line) = server.next_line().await? {
        let msg = match ServerMessage::parse(&line) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(error = %e, "Ignoring line");
                continue;
            }
        };
        if let ServerMessage::Message(text) = &msg {
            show(&format!("{text}\n"))?;
        }

        match view.apply(&msg) {
            ClientAction::Wait => {}
            ClientAction::AskMove => {
                show(&format!("\n{}\n\n", view.board().display()))?;
                let cell = loop {
                    let Some(input) = ask(stdin, "Your move (0-8, q to quit): ").await? else {
                        return Ok(false);
                    };
                    if input.eq_ignore_ascii_case("q") {
                        write_half.write_all(format!("{}\n", ClientCommand::Quit).as_bytes()).await?;
                        return Ok(false);
                    }
                    match input.parse::<usize>() {
                        Ok(cell) => break cell,
                        Err(_) => show("Enter a number 0-8.\n")?,
                    }
                };
                view.move_sent(cell);
                write_half
                    .write_all(format!("{}\n", ClientCommand::Move(cell)).as_bytes())
                    .await?;
            }
            ClientAction::Finished(outcome) => {
                show(&format!("\n{}\n\n", view.board().display()))?;
                let text = match outcome {
                    ServerMessage::Victory => "You win!",
                    ServerMessage::Defeat => "You lose.",
                    _ => "It's a tie.",
                };
                show(&format!("{text}\n"))?;
                write_half.write_all(format!("{}\n", ClientCommand::Quit).as_bytes()).await?;
                return Ok(true);
            }
            ClientAction::Abandoned => {
                write_half.write_all(format!("{}\n", ClientCommand::Quit).as_bytes()).await?;
                return Ok(true);
            }
        }
    }

    show("Disconnected from server.\n")?;
    Ok(true)
}

/// Plays games against `addr` until the user declines another round.
#[instrument]
pub async fn play(addr: &str) -> std::io::Result<()> {
    let mut stdin = BufReader::new(tokio::io::stdin()).lines();
    loop {
        if !play_round(addr, &mut stdin).await? {
            return Ok(());
        }
        match ask(&mut stdin, "Play again? [y/N] ").await? {
            Some(answer) if answer.eq_ignore_ascii_case("y") => continue,
            _ => return Ok(()),
        }
    }
}
