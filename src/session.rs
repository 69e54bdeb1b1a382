//! Game session: one board shared by two participants.
//!
//! [`GameSession::attempt_move`] is the only way to change the board. It
//! runs entirely under the session lock, and both participants' lines for a
//! move are queued before the lock is released, so a third move can never be
//! accepted while either side is still unaware of the second.

use crate::games::tictactoe::{Board, Mark, Position};
use crate::protocol::{OPPONENT_DISCONNECTED, ServerMessage};
use derive_more::{Display, Error, From};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tokio::sync::mpsc;
use tracing::{debug, info, instrument, warn};

/// Queue of lines waiting to be written to one participant's connection.
pub type Outbox = mpsc::Sender<ServerMessage>;

/// Lines an outbox holds before senders must wait for the writer.
///
/// A whole game queues fewer than 25 lines per side, so game traffic never
/// fills an outbox; only a participant that stops reading can.
pub const OUTBOX_CAPACITY: usize = 64;

/// Unique identifier for a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, From)]
#[display("session-{_0}")]
pub struct SessionId(u64);

/// Why a move was refused.
///
/// The `Display` text is what the mover sees in the rejection `MESSAGE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Error)]
pub enum MoveError {
    /// The requester does not hold the turn.
    #[display("Not your turn")]
    NotYourTurn,
    /// Target cell already holds a mark.
    #[display("Cell {_0} is already taken")]
    CellOccupied(#[error(not(source))] Position),
    /// Index outside 0-8.
    #[display("Cell {_0} is off the board (expected 0-8)")]
    OutOfRange(#[error(not(source))] usize),
    /// The board already has a winner or is full.
    #[display("The game is over")]
    GameOver,
    /// The other participant has left the session.
    #[display("{}", OPPONENT_DISCONNECTED)]
    OpponentLeft,
}

/// Result of the game from one participant's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// This participant filled a line.
    Victory,
    /// The opponent filled a line.
    Defeat,
    /// Full board, no line.
    Tie,
    /// Undecided.
    Continue,
}

impl Outcome {
    /// Derives the outcome for `mark` from the board.
    pub fn for_mark(board: &Board, mark: Mark) -> Self {
        match board.winner() {
            Some(winner) if winner == mark => Outcome::Victory,
            Some(_) => Outcome::Defeat,
            None if board.is_full() => Outcome::Tie,
            None => Outcome::Continue,
        }
    }

    /// True unless the game is still undecided.
    pub fn is_final(self) -> bool {
        self != Outcome::Continue
    }
}

impl From<Outcome> for ServerMessage {
    fn from(outcome: Outcome) -> Self {
        match outcome {
            Outcome::Victory => ServerMessage::Victory,
            Outcome::Defeat => ServerMessage::Defeat,
            Outcome::Tie => ServerMessage::Tie,
            Outcome::Continue => ServerMessage::Continue,
        }
    }
}

#[derive(Debug)]
struct SessionState {
    board: Board,
    turn: Mark,
    moves: usize,
    outbox_x: Option<Outbox>,
    outbox_o: Option<Outbox>,
    departed: Option<Mark>,
}

impl SessionState {
    fn outbox(&self, mark: Mark) -> Option<&Outbox> {
        match mark {
            Mark::X => self.outbox_x.as_ref(),
            Mark::O => self.outbox_o.as_ref(),
        }
    }

    fn take_outbox(&mut self, mark: Mark) -> Option<Outbox> {
        match mark {
            Mark::X => self.outbox_x.take(),
            Mark::O => self.outbox_o.take(),
        }
    }

    fn notify(&self, mark: Mark, msg: ServerMessage) {
        match self.outbox(mark) {
            Some(outbox) => match outbox.try_send(msg) {
                Ok(()) => {}
                Err(mpsc::error::TrySendError::Full(_)) => {
                    warn!(%mark, "Outbox full, dropping notification");
                }
                Err(mpsc::error::TrySendError::Closed(_)) => {
                    debug!(%mark, "Writer already gone, dropping notification");
                }
            },
            None => debug!(%mark, "Participant already left, dropping notification"),
        }
    }
}

/// A game session with two participants.
#[derive(Debug)]
pub struct GameSession {
    id: SessionId,
    state: Mutex<SessionState>,
}

impl GameSession {
    /// Creates a session with an empty board and X to move.
    ///
    /// Both outboxes are wired in before either participant starts.
    #[instrument(skip(outbox_x, outbox_o))]
    pub fn new(id: SessionId, outbox_x: Outbox, outbox_o: Outbox) -> Self {
        info!(session_id = %id, "Creating new game session");
        Self {
            id,
            state: Mutex::new(SessionState {
                board: Board::new(),
                turn: Mark::FIRST,
                moves: 0,
                outbox_x: Some(outbox_x),
                outbox_o: Some(outbox_o),
                departed: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        // Every mutation completes before anything can panic, so a poisoned
        // guard still holds a consistent board.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Session ID.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Attempts to occupy `cell` for `mark`.
    ///
    /// On success the turn passes to the opponent, and before the lock is
    /// released the opponent gets `OPPONENT_MOVED` plus its status line and
    /// the mover gets `VALID_MOVE` plus its own status line. Returns the
    /// mover's outcome. On failure nothing changes and nothing is queued.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn attempt_move(&self, cell: usize, mark: Mark) -> Result<Outcome, MoveError> {
        let mut state = self.lock();

        if state.departed.is_some() {
            debug!("Move after a participant left");
            return Err(MoveError::OpponentLeft);
        }
        if Outcome::for_mark(&state.board, mark).is_final() {
            debug!("Move after the game ended");
            return Err(MoveError::GameOver);
        }
        if state.turn != mark {
            warn!(expected = %state.turn, "Move out of turn");
            return Err(MoveError::NotYourTurn);
        }
        let pos = Position::try_from(cell).map_err(|_| MoveError::OutOfRange(cell))?;
        if !state.board.is_empty(pos) {
            debug!(position = pos.label(), "Cell already taken");
            return Err(MoveError::CellOccupied(pos));
        }

        state.board.occupy(pos, mark);
        state.moves += 1;
        let opponent = mark.opponent();
        state.turn = opponent;

        let opponent_outcome = Outcome::for_mark(&state.board, opponent);
        state.notify(opponent, ServerMessage::OpponentMoved(cell));
        state.notify(opponent, opponent_outcome.into());

        let outcome = Outcome::for_mark(&state.board, mark);
        state.notify(mark, ServerMessage::ValidMove);
        state.notify(mark, outcome.into());

        info!(
            position = pos.label(),
            moves = state.moves,
            ?outcome,
            ?opponent_outcome,
            "Move accepted"
        );
        Ok(outcome)
    }

    /// Outcome for `mark` on the current board.
    pub fn outcome_for(&self, mark: Mark) -> Outcome {
        Outcome::for_mark(&self.lock().board, mark)
    }

    /// Records that `mark` left the session.
    ///
    /// Drops the session's handle on the leaver's outbox. If the game was
    /// still undecided the remaining participant is told, and any further
    /// moves are refused.
    #[instrument(skip(self), fields(session_id = %self.id))]
    pub fn leave(&self, mark: Mark) {
        let mut state = self.lock();
        drop(state.take_outbox(mark));

        if state.departed.is_some() {
            debug!("Second participant left");
            return;
        }
        state.departed = Some(mark);

        if Outcome::for_mark(&state.board, mark).is_final() {
            info!("Participant left after the game ended");
        } else {
            info!("Participant left mid-game, notifying opponent");
            state.notify(
                mark.opponent(),
                ServerMessage::message(OPPONENT_DISCONNECTED),
            );
        }
    }

    /// Snapshot of the board.
    pub fn board(&self) -> Board {
        self.lock().board.clone()
    }

    /// Mark allowed to move next.
    pub fn turn_holder(&self) -> Mark {
        self.lock().turn
    }

    /// Number of accepted moves.
    pub fn moves_played(&self) -> usize {
        self.lock().moves
    }
}

impl Drop for GameSession {
    fn drop(&mut self) {
        debug!(session_id = %self.id, "Session released");
    }
}
