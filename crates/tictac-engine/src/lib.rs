//! Board engine for Tictac.
//!
//! Pure win/draw/turn logic over a 3x3 grid. Nothing in this crate does I/O
//! or keeps hidden state: every function takes a board by reference and
//! returns a new value, so the same input always produces the same output.
//!
//! # Layout
//!
//! Cells are addressed by a single index, row-major:
//!
//! ```text
//!  0 | 1 | 2
//! ---+---+---
//!  3 | 4 | 5
//! ---+---+---
//!  6 | 7 | 8
//! ```
//!
//! # Example
//!
//! ```rust
//! use tictac_engine::{apply_move, evaluate, Board, Mark, Outcome};
//!
//! let board = Board::empty();
//! let board = apply_move(&board, Mark::X, 4).unwrap();
//! assert_eq!(evaluate(&board), Outcome::Ongoing);
//! ```

mod board;
mod error;
mod rules;

pub use board::{Board, Cell, Mark, BOARD_SIZE};
pub use error::MoveRejected;
pub use rules::{apply_move, evaluate, Outcome, WinningLine, WIN_LINES};
