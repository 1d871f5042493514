//! # Tictac
//!
//! Two-player networked tic-tac-toe. The two players never talk to each
//! other: both follow one shared game document in a document store, and
//! each client keeps its own view in sync with whatever the store commits.
//!
//! The workspace is layered; this crate ties the layers together and adds
//! the networked store:
//!
//! - [`StoreServer`]: serves an in-memory document store over WebSocket
//! - [`RemoteStore`]: a `DocumentStore` client for that server
//! - [`TictacError`]: one error type wrapping every layer's errors
//! - [`prelude`]: everything a client or server needs in one import
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use tictac::prelude::*;
//!
//! # async fn play() -> Result<(), TictacError> {
//! let store = RemoteStore::connect("ws://127.0.0.1:9001").await?;
//! let mut binder = SessionBinder::new(
//!     GameStore::new(store),
//!     NoopNotifier,
//!     UserId::new("alice"),
//!     BinderConfig::default(),
//! );
//!
//! let code = binder.host().await?;
//! println!("invite code: {code}");
//! while let Some(view) = binder.next_snapshot().await {
//!     if view.is_local_turn {
//!         binder.attempt_move(4).await?;
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod error;
mod handler;
mod remote;
mod server;

pub use error::TictacError;
pub use remote::RemoteStore;
pub use server::{StoreServer, StoreServerBuilder};

/// The types most users need, re-exported from every layer.
pub mod prelude {
    pub use crate::{RemoteStore, StoreServer, StoreServerBuilder, TictacError};

    pub use tictac_engine::{
        apply_move, evaluate, Board, Cell, Mark, MoveRejected, Outcome,
        WinningLine, BOARD_SIZE,
    };
    pub use tictac_protocol::{
        Document, DocumentId, FieldUpdate, GameSession, Role, SessionId,
        UserId, Winner, GAMES_COLLECTION, PROTOCOL_VERSION,
    };
    pub use tictac_session::{
        BinderConfig, BinderError, BinderState, IdentityProvider,
        IgnoreReason, LocalGameView, MoveAttempt, NoopNotifier, Notifier,
        Phase, Reminder, SessionBinder, StaticIdentity, TimerNotifier,
    };
    pub use tictac_store::{
        DocumentSnapshot, DocumentStore, GameStore, GameStoreError,
        GameSubscription, JoinRejection, MemoryStore, StoreConfig,
        StoreError, Subscription,
    };
}
