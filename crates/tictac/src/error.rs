//! Unified error type for Tictac.

use tictac_engine::MoveRejected;
use tictac_protocol::ProtocolError;
use tictac_session::BinderError;
use tictac_store::{GameStoreError, StoreError};
use tictac_transport::TransportError;

/// Top-level error that wraps all crate-specific errors.
///
/// With the `tictac` facade you deal with this one type instead of
/// importing each layer's error. Every variant has a `From` impl, so `?`
/// converts layer errors automatically.
#[derive(Debug, thiserror::Error)]
pub enum TictacError {
    /// A board rule rejected a move.
    #[error(transparent)]
    Move(#[from] MoveRejected),

    /// A message couldn't be encoded or decoded.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A connection failed (connect, accept, send, receive).
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A document store operation failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// A game store operation failed or a join was rejected.
    #[error(transparent)]
    Game(#[from] GameStoreError),

    /// A session binder operation failed.
    #[error(transparent)]
    Binder(#[from] BinderError),
}
