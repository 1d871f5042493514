//! Document storage and the game session adapter for Tictac.
//!
//! Two clients never talk to each other. They both read, write and watch
//! the same document in a store, and the store fans every committed change
//! out to everyone watching.
//!
//! # Key types
//!
//! - [`DocumentStore`]: the generic store contract (create with a generated
//!   id, get, update fields by path, subscribe)
//! - [`Subscription`]: a live watch on one document; also its own
//!   cancellation handle
//! - [`snapshot_channel`]: the bounded queue behind each watch, which
//!   drops superseded snapshots instead of growing when a subscriber lags
//! - [`MemoryStore`]: an in-process store running as a Tokio actor
//! - [`GameStore`]: translates game operations (create, join, move, reset)
//!   into document operations on any `DocumentStore`
//!
//! # Consistency
//!
//! Writes are last-writer-wins on the document. There is no version check,
//! so two clients that both act on a stale snapshot can both succeed; the
//! later commit is what everyone observes.

mod backend;
mod config;
mod delivery;
mod document;
mod error;
mod game;
mod memory;

pub use backend::{DocumentSnapshot, DocumentStore, Subscription};
pub use config::{StoreConfig, DEFAULT_SNAPSHOT_BUFFER};
pub use delivery::{snapshot_channel, SnapshotReceiver, SnapshotSender};
pub use document::{apply_updates, generate_id};
pub use error::{GameStoreError, JoinRejection, StoreError};
pub use game::{now_millis, GameStore, GameSubscription};
pub use memory::MemoryStore;
