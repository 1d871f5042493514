//! Error types for the protocol layer.
//!
//! Each Tictac crate defines its own error enum. A `ProtocolError` always
//! means "these bytes or this document don't have the shape we expect",
//! never a network or storage problem.

/// Errors that can occur in the protocol layer.
///
/// `thiserror` generates the `Display` and `std::error::Error` impls from
/// the `#[error(...)]` attributes. `#[source]` keeps the underlying serde
/// error reachable through `Error::source()`, so a log line shows both
/// "decode failed" and the exact column serde choked on.
///
/// The store and session crates wrap this type rather than flattening it:
/// a malformed game document surfaces as `GameStoreError::Malformed`, a
/// bad frame as `StoreError::Protocol`.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// Serialization failed (turning a Rust value into bytes or JSON).
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),

    /// Deserialization failed: malformed JSON, a missing field, a board with
    /// the wrong number of cells, an unknown mark, and so on.
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),

    /// The message decoded but breaks a protocol rule, e.g. a first message
    /// that isn't `Hello` or a reply nobody asked for.
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}
