//! Wire protocol for Tictac.
//!
//! This crate defines everything that leaves a process:
//!
//! - **Game document** ([`GameSession`], [`Winner`], [`Role`]): the shared
//!   document both clients read and write. Its field names are the
//!   interoperability contract with existing deployments.
//! - **Document store messages** ([`Envelope`], [`StoreRequest`],
//!   [`StoreReply`], [`SnapshotEvent`]): how a client talks to a networked
//!   document store.
//! - **Codec** ([`Codec`] trait, [`JsonCodec`]): how messages become bytes.
//! - **Errors** ([`ProtocolError`]).
//!
//! ```text
//! Transport (bytes) → Protocol (Envelope / GameSession) → Store → Binder
//! ```

mod codec;
mod error;
mod session;
mod types;

pub use codec::{Codec, JsonCodec};
pub use error::ProtocolError;
pub use session::{fields, GameSession, Role, Winner, GAMES_COLLECTION};
pub use types::{
    Document, DocumentId, Envelope, FieldUpdate, FieldValue, Payload,
    SessionId, SnapshotEvent, StoreReply, StoreRequest, UserId, WatchId,
};

/// The current store protocol version. Clients send it in their `Hello`
/// and are rejected on mismatch.
pub const PROTOCOL_VERSION: u32 = 1;
