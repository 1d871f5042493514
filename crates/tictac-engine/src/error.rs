//! Error type for the board engine.

/// Why a move was not applied.
///
/// These are validation rejections: the board is left untouched and the
/// caller decides whether to tell anyone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum MoveRejected {
    /// The index is not in `0..=8`.
    #[error("cell {0} is off the board")]
    OutOfBounds(usize),

    /// Someone already played in this cell.
    #[error("cell {0} is already taken")]
    Occupied(usize),

    /// The board already has a winner (or is a draw).
    #[error("the game is already over")]
    GameOver,
}
