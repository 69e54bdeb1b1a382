//! Line protocol spoken between participants and the server.
//!
//! ```text
//! Client -> Server           Server -> Client
//! ----------------           ----------------
//! MOVE <n>  (0 <= n <= 8)    WELCOME <mark>
//! QUIT                       VALID_MOVE
//!                            OPPONENT_MOVED <n>
//!                            VICTORY | DEFEAT | TIE
//!                            MESSAGE <text>
//!                            <empty line>  (game continues)
//! ```
//!
//! Every message is exactly one line.

use crate::games::tictactoe::Mark;
use derive_more::{Display, Error};
use tracing::instrument;

/// Status text sent to a seated participant whose opponent has not arrived.
pub const WAITING_FOR_OPPONENT: &str = "Waiting for opponent to connect";
/// Status text sent to both participants when their session starts.
pub const ALL_CONNECTED: &str = "All players connected";
/// Status text sent to the participant holding the first turn.
pub const YOUR_TURN: &str = "Your turn";
/// Status text sent when the other participant leaves an undecided game.
pub const OPPONENT_DISCONNECTED: &str = "Opponent disconnected";

/// Command sent by a participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ClientCommand {
    /// Request to occupy a cell. The index is range-checked by the session.
    #[display("MOVE {_0}")]
    Move(usize),
    /// Leave the session.
    #[display("QUIT")]
    Quit,
}

/// A command line that could not be understood.
#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum ProtocolError {
    /// Empty or whitespace-only line.
    #[display("Empty command")]
    Empty,
    /// Verb is not part of the protocol.
    #[display("Unknown command: {_0}")]
    UnknownCommand(#[error(not(source))] String),
    /// `MOVE` without a usable cell number.
    #[display("MOVE needs a cell number 0-8, got {_0:?}")]
    BadCell(#[error(not(source))] String),
    /// Server line with an unknown shape.
    #[display("Unrecognized server message: {_0}")]
    UnknownMessage(#[error(not(source))] String),
}

impl ClientCommand {
    /// Parses one command line.
    #[instrument]
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim();
        let (verb, arg) = match line.split_once(char::is_whitespace) {
            Some((verb, arg)) => (verb, arg.trim()),
            None => (line, ""),
        };

        match verb {
            "" => Err(ProtocolError::Empty),
            "MOVE" => arg
                .parse::<usize>()
                .map(ClientCommand::Move)
                .map_err(|_| ProtocolError::BadCell(arg.to_string())),
            "QUIT" => Ok(ClientCommand::Quit),
            other => Err(ProtocolError::UnknownCommand(other.to_string())),
        }
    }
}

/// Notification sent by the server.
#[derive(Debug, Clone, PartialEq, Eq, Display)]
pub enum ServerMessage {
    /// Assigned mark, sent once when the participant is seated.
    #[display("WELCOME {_0}")]
    Welcome(Mark),
    /// Free-text status.
    #[display("MESSAGE {_0}")]
    Message(String),
    /// The requested move was accepted.
    #[display("VALID_MOVE")]
    ValidMove,
    /// The opponent occupied a cell.
    #[display("OPPONENT_MOVED {_0}")]
    OpponentMoved(usize),
    /// This participant won.
    #[display("VICTORY")]
    Victory,
    /// This participant lost.
    #[display("DEFEAT")]
    Defeat,
    /// Board filled with no winner.
    #[display("TIE")]
    Tie,
    /// Game goes on (blank status line).
    #[display("")]
    Continue,
}

impl ServerMessage {
    /// Builds a `MESSAGE` line.
    pub fn message(text: impl Into<String>) -> Self {
        ServerMessage::Message(text.into())
    }

    /// True for `VICTORY`, `DEFEAT` and `TIE`.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ServerMessage::Victory | ServerMessage::Defeat | ServerMessage::Tie
        )
    }

    /// Parses one line received from the server.
    #[instrument]
    pub fn parse(line: &str) -> Result<Self, ProtocolError> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return Ok(ServerMessage::Continue);
        }

        let (verb, arg) = line.split_once(' ').unwrap_or((line, ""));
        let unknown = || ProtocolError::UnknownMessage(line.to_string());

        match verb {
            "WELCOME" => arg.trim().parse().map(ServerMessage::Welcome).map_err(|_| unknown()),
            "MESSAGE" => Ok(ServerMessage::Message(arg.to_string())),
            "VALID_MOVE" => Ok(ServerMessage::ValidMove),
            "OPPONENT_MOVED" => arg
                .trim()
                .parse()
                .map(ServerMessage::OpponentMoved)
                .map_err(|_| unknown()),
            "VICTORY" => Ok(ServerMessage::Victory),
            "DEFEAT" => Ok(ServerMessage::Defeat),
            "TIE" => Ok(ServerMessage::Tie),
            _ => Err(unknown()),
        }
    }
}
