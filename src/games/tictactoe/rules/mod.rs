//! Game rules for tic-tac-toe.
//!
//! Pure functions over a [`Board`]. Rules are kept apart from board
//! storage; the board predicates below simply delegate here.

pub mod draw;
pub mod win;

pub use draw::{is_draw, is_full};
pub use win::{LINES, check_winner};

use super::{Board, Mark};

impl Board {
    /// True iff one mark fills any of the 8 winning lines.
    pub fn has_winner(&self) -> bool {
        self.winner().is_some()
    }

    /// The mark that fills a winning line, if any.
    pub fn winner(&self) -> Option<Mark> {
        check_winner(self)
    }

    /// True iff every square is occupied.
    pub fn is_full(&self) -> bool {
        is_full(self)
    }
}
