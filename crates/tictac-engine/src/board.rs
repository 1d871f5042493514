//! Board types: marks, cells, and the 9-cell board.
//!
//! The serialized forms of these types are part of the shared-document wire
//! contract, so their serde attributes matter as much as their fields:
//! a cell is `""`, `"X"` or `"O"`, and a board is a plain array of 9 cells.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of cells on a board.
pub const BOARD_SIZE: usize = 9;

// ---------------------------------------------------------------------------
// Mark
// ---------------------------------------------------------------------------

/// The symbol a player puts on the board.
///
/// X always moves first. The host of a session plays X, the guest plays O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Mark {
    X,
    O,
}

impl Mark {
    /// Returns the other player's mark.
    pub fn opponent(self) -> Self {
        match self {
            Self::X => Self::O,
            Self::O => Self::X,
        }
    }
}

impl fmt::Display for Mark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::O => write!(f, "O"),
        }
    }
}

// ---------------------------------------------------------------------------
// Cell
// ---------------------------------------------------------------------------

/// The content of one board cell.
///
/// Older documents wrote empty cells as `"none"`; the alias keeps those
/// readable.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
pub enum Cell {
    #[default]
    #[serde(rename = "", alias = "none")]
    Empty,
    X,
    O,
}

impl Cell {
    /// Returns `true` if nobody has played here.
    pub fn is_empty(self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the mark in this cell, if any.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Self::Empty => None,
            Self::X => Some(Mark::X),
            Self::O => Some(Mark::O),
        }
    }
}

impl From<Mark> for Cell {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Self::X,
            Mark::O => Self::O,
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, " "),
            Self::X => write!(f, "X"),
            Self::O => write!(f, "O"),
        }
    }
}

// ---------------------------------------------------------------------------
// Board
// ---------------------------------------------------------------------------

/// A 3x3 board stored as 9 cells in row-major order.
///
/// The array length is part of the type, so a board can never hold more or
/// fewer than 9 entries. Deserializing an array of any other length fails.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Board([Cell; BOARD_SIZE]);

impl Board {
    /// A board with every cell empty.
    pub fn empty() -> Self {
        Self([Cell::Empty; BOARD_SIZE])
    }

    /// Builds a board from 9 cells.
    pub fn from_cells(cells: [Cell; BOARD_SIZE]) -> Self {
        Self(cells)
    }

    /// Returns the cell at `index`, or `None` if the index is off the board.
    pub fn get(&self, index: usize) -> Option<Cell> {
        self.0.get(index).copied()
    }

    /// All 9 cells, row-major.
    pub fn cells(&self) -> &[Cell; BOARD_SIZE] {
        &self.0
    }

    /// Number of cells nobody has played yet.
    pub fn empty_count(&self) -> usize {
        self.0.iter().filter(|c| c.is_empty()).count()
    }

    /// Returns `true` if every cell holds a mark.
    pub fn is_full(&self) -> bool {
        self.empty_count() == 0
    }

    /// Returns a copy with `index` set to `cell`.
    ///
    /// Only the rules module writes cells; it checks the index first.
    pub(crate) fn with(mut self, index: usize, cell: Cell) -> Self {
        self.0[index] = cell;
        self
    }
}

impl fmt::Display for Board {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (row, cells) in self.0.chunks(3).enumerate() {
            if row > 0 {
                writeln!(f, "---+---+---")?;
            }
            writeln!(f, " {} | {} | {}", cells[0], cells[1], cells[2])?;
        }
        Ok(())
    }
}
