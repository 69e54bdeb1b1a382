//! Tests for tic-tac-toe positions.

use strictly_duel::{Board, Mark, OutOfRange, Position, Square};

#[test]
fn test_position_to_index() {
    assert_eq!(Position::TopLeft.to_index(), 0);
    assert_eq!(Position::Center.to_index(), 4);
    assert_eq!(Position::BottomRight.to_index(), 8);
}

#[test]
fn test_position_from_index() {
    assert_eq!(Position::from_index(0), Some(Position::TopLeft));
    assert_eq!(Position::from_index(4), Some(Position::Center));
    assert_eq!(Position::from_index(8), Some(Position::BottomRight));
    assert_eq!(Position::from_index(9), None);
    assert_eq!(Position::try_from(9), Err(OutOfRange { index: 9 }));
}

#[test]
fn test_occupied_squares_stay_occupied() {
    let mut board = Board::new();
    board.occupy(Position::TopLeft, Mark::X);
    board.occupy(Position::Center, Mark::O);

    let empty: Vec<Position> = Position::ALL
        .into_iter()
        .filter(|p| board.is_empty(*p))
        .collect();
    assert_eq!(empty.len(), 7);
    assert!(!empty.contains(&Position::TopLeft));
    assert!(!empty.contains(&Position::Center));
    assert_eq!(board.get(Position::TopLeft), Square::Occupied(Mark::X));
    assert_eq!(board.occupied(), 2);
}
