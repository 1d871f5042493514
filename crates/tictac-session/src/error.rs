//! Error types for the session binder.

use tictac_protocol::SessionId;
use tictac_store::GameStoreError;

/// Errors from [`SessionBinder`](crate::SessionBinder) operations.
///
/// Moves that break the rules are not errors; they come back as
/// [`MoveAttempt::Ignored`](crate::MoveAttempt::Ignored).
#[derive(Debug, thiserror::Error)]
pub enum BinderError {
    /// The identity provider has no signed-in user.
    #[error("no user is signed in")]
    NotSignedIn,

    /// `host` or `join` was called while already in a session.
    #[error("already bound to session {0}")]
    AlreadyBound(SessionId),

    /// The game store failed or rejected the operation.
    #[error(transparent)]
    Store(#[from] GameStoreError),
}

impl BinderError {
    /// The join rejection behind this error, if that's what it is.
    pub fn join_rejection(&self) -> Option<tictac_store::JoinRejection> {
        match self {
            Self::Store(GameStoreError::Join(rejection)) => Some(*rejection),
            _ => None,
        }
    }
}
