//! Game rules: applying moves and evaluating boards.

use crate::{Board, Cell, Mark, MoveRejected, BOARD_SIZE};

/// Three board indices forming a row, column, or diagonal.
pub type WinningLine = [usize; 3];

/// Every winning triple, in the order they are checked.
///
/// Rows come first, then columns, then the two diagonals. When a board
/// contains more than one completed triple (only possible in positions no
/// legal game reaches, or with a double line on the final move) the first
/// one in this order is reported.
pub const WIN_LINES: [WinningLine; 8] = [
    // rows
    [0, 1, 2],
    [3, 4, 5],
    [6, 7, 8],
    // columns
    [0, 3, 6],
    [1, 4, 7],
    [2, 5, 8],
    // diagonals
    [0, 4, 8],
    [2, 4, 6],
];

/// The state of a board as far as the rules are concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nobody has won and there are empty cells left.
    Ongoing,
    /// `mark` owns all three cells of `line`.
    Win { mark: Mark, line: WinningLine },
    /// The board is full and nobody won.
    Draw,
}

impl Outcome {
    /// Returns `true` for `Win` and `Draw`.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Ongoing)
    }
}

/// Places `mark` at `index` and returns the resulting board.
///
/// The input board is never modified.
///
/// # Errors
/// - [`MoveRejected::GameOver`] if the board is already won or drawn
/// - [`MoveRejected::OutOfBounds`] if `index` is not in `0..=8`
/// - [`MoveRejected::Occupied`] if the cell is already taken
pub fn apply_move(
    board: &Board,
    mark: Mark,
    index: usize,
) -> Result<Board, MoveRejected> {
    if evaluate(board).is_terminal() {
        return Err(MoveRejected::GameOver);
    }
    if index >= BOARD_SIZE {
        return Err(MoveRejected::OutOfBounds(index));
    }
    if !board.cells()[index].is_empty() {
        return Err(MoveRejected::Occupied(index));
    }
    Ok(board.with(index, Cell::from(mark)))
}

/// Evaluates a board: win, draw, or still going.
pub fn evaluate(board: &Board) -> Outcome {
    let cells = board.cells();
    for line in WIN_LINES {
        let [a, b, c] = line;
        if let Some(mark) = cells[a].mark() {
            if cells[a] == cells[b] && cells[b] == cells[c] {
                return Outcome::Win { mark, line };
            }
        }
    }

    if board.is_full() {
        Outcome::Draw
    } else {
        Outcome::Ongoing
    }
}
