//! Core domain types for tic-tac-toe.

use super::position::Position;
use serde::{Deserialize, Serialize};

/// Mark assigned to a participant for the lifetime of a session.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
    strum::EnumIter,
)]
pub enum Mark {
    /// Mark X (moves first).
    X,
    /// Mark O (moves second).
    O,
}

impl Mark {
    /// The mark that holds the turn on an empty board.
    pub const FIRST: Mark = Mark::X;

    /// Returns the opposing mark.
    pub fn opponent(self) -> Self {
        match self {
            Mark::X => Mark::O,
            Mark::O => Mark::X,
        }
    }
}

/// A square on the tic-tac-toe board.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Square {
    /// Empty square.
    Empty,
    /// Square occupied by a mark.
    Occupied(Mark),
}

/// 3x3 tic-tac-toe board.
///
/// Squares only ever go from [`Square::Empty`] to [`Square::Occupied`];
/// there is no operation that clears a square.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    /// Squares in row-major order (0-8).
    squares: [Square; 9],
}

impl Board {
    /// Creates a new empty board.
    pub fn new() -> Self {
        Self {
            squares: [Square::Empty; 9],
        }
    }

    /// Gets the square at the given position.
    pub fn get(&self, pos: Position) -> Square {
        self.squares[pos.to_index()]
    }

    /// Checks if a square is empty.
    pub fn is_empty(&self, pos: Position) -> bool {
        self.get(pos) == Square::Empty
    }

    /// Occupies an empty square.
    ///
    /// The caller is responsible for checking that the square is empty.
    pub fn occupy(&mut self, pos: Position, mark: Mark) {
        debug_assert!(self.is_empty(pos), "square {pos} already occupied");
        self.squares[pos.to_index()] = Square::Occupied(mark);
    }

    /// Returns all squares.
    pub fn squares(&self) -> &[Square; 9] {
        &self.squares
    }

    /// Number of occupied squares.
    pub fn occupied(&self) -> usize {
        self.squares
            .iter()
            .filter(|sq| **sq != Square::Empty)
            .count()
    }

    /// Formats the board as a human-readable grid.
    ///
    /// Empty squares show their index so a player can see what to type.
    pub fn display(&self) -> String {
        let mut result = String::new();
        for row in 0..3 {
            for col in 0..3 {
                let idx = row * 3 + col;
                let symbol = match self.squares[idx] {
                    Square::Empty => idx.to_string(),
                    Square::Occupied(mark) => mark.to_string(),
                };
                result.push(' ');
                result.push_str(&symbol);
                result.push(' ');
                if col < 2 {
                    result.push('|');
                }
            }
            if row < 2 {
                result.push_str("\n---+---+---\n");
            }
        }
        result
    }
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opponent_flips() {
        assert_eq!(Mark::X.opponent(), Mark::O);
        assert_eq!(Mark::O.opponent(), Mark::X);
        assert_eq!(Mark::FIRST, Mark::X);
    }

    #[test]
    fn test_mark_round_trips_through_text() {
        assert_eq!(Mark::X.to_string(), "X");
        assert_eq!("O".parse::<Mark>().unwrap(), Mark::O);
        assert!("Z".parse::<Mark>().is_err());
    }

    #[test]
    fn test_occupy_sets_square() {
        let mut board = Board::new();
        board.occupy(Position::Center, Mark::O);
        assert_eq!(board.get(Position::Center), Square::Occupied(Mark::O));
        assert!(board.is_empty(Position::TopLeft));
        assert_eq!(board.occupied(), 1);
    }

    #[test]
    fn test_display_shows_indices_and_marks() {
        let mut board = Board::new();
        board.occupy(Position::TopLeft, Mark::X);
        board.occupy(Position::BottomRight, Mark::O);
        let text = board.display();
        assert!(text.starts_with(" X | 1 | 2 "));
        assert!(text.ends_with(" 6 | 7 | O "));
    }
}
