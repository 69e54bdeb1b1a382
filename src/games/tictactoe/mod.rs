//! Tic-tac-toe board and rules.

mod position;
mod rules;
mod types;

pub use position::{OutOfRange, Position};
pub use rules::{LINES, check_winner, is_draw, is_full};
pub use types::{Board, Mark, Square};
