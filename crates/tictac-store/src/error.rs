//! Error types for the store layer.

use tictac_protocol::{DocumentId, ProtocolError};

/// Errors from a [`DocumentStore`](crate::DocumentStore) backend.
///
/// These are transient or structural failures of the storage itself. The
/// core never retries them; they are handed back to whoever acted.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The document does not exist.
    #[error("document {collection}/{id} not found")]
    NotFound { collection: String, id: DocumentId },

    /// A field path in an update can't be applied to the document.
    #[error("invalid field path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// The store can't be reached: its actor stopped or the connection to a
    /// remote store dropped.
    #[error("store unavailable")]
    Unavailable,

    /// A remote store answered with an error we have no better variant for.
    #[error("store error {code}: {message}")]
    Remote { code: u16, message: String },

    /// A message to or from a remote store was malformed.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
}

impl StoreError {
    /// The HTTP-style status code a store server reports for this error.
    pub fn code(&self) -> u16 {
        match self {
            Self::NotFound { .. } => 404,
            Self::InvalidPath { .. } | Self::Protocol(_) => 400,
            Self::Unavailable => 503,
            Self::Remote { code, .. } => *code,
        }
    }
}

/// Why a join request was turned down.
///
/// The `Display` text is short and meant to be shown to the player, who
/// then has to enter a different invite code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum JoinRejection {
    /// No game exists for the invite code.
    #[error("no game found for that invite code")]
    NotFound,

    /// Someone already took the guest seat.
    #[error("that game already has two players")]
    SlotTaken,

    /// The host tried to join their own game.
    #[error("you can't join a game you are hosting")]
    SelfJoin,
}

/// Errors from [`GameStore`](crate::GameStore) operations.
#[derive(Debug, thiserror::Error)]
pub enum GameStoreError {
    /// A join was rejected by the game rules.
    #[error(transparent)]
    Join(#[from] JoinRejection),

    /// The backing store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The stored document isn't a valid game session.
    #[error("malformed game document: {0}")]
    Malformed(#[from] ProtocolError),
}
