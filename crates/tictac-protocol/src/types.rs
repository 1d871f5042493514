//! Identity types and document-store wire messages.
//!
//! Everything here is serialized and sent between a store client and a
//! store server, so the serde attributes define the wire format.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// The account identifier handed to us by the identity provider.
///
/// Opaque: we only compare user ids for equality and store them in
/// documents. `#[serde(transparent)]` keeps it a plain JSON string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The store-assigned identifier of a document.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Wraps a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The raw identifier.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A game session is addressed by its document id. Shown to players as the
/// invite code.
pub type SessionId = DocumentId;

/// Identifies one active subscription on a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WatchId(pub u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "W-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Documents and field updates
// ---------------------------------------------------------------------------

/// A stored document: a JSON object.
pub type Document = serde_json::Map<String, Value>;

/// What to do with the field at a path.
///
/// Serialized adjacently tagged:
/// `{ "op": "set", "value": 3 }` or `{ "op": "delete" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum FieldValue {
    /// Write this value, creating intermediate objects as needed.
    Set(Value),
    /// Remove the field. Deleting a field that isn't there is not an error.
    Delete,
}

/// One field write inside an update.
///
/// `path` is dot-separated. Segments address object keys or, when the
/// current value is an array, an element index: `board.4` is the fifth
/// cell of the `board` array.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldUpdate {
    pub path: String,
    pub value: FieldValue,
}

impl FieldUpdate {
    /// A `Set` update.
    pub fn set(path: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            path: path.into(),
            value: FieldValue::Set(value.into()),
        }
    }

    /// A `Delete` update.
    pub fn delete(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            value: FieldValue::Delete,
        }
    }
}

// ---------------------------------------------------------------------------
// Store messages
// ---------------------------------------------------------------------------

/// Client → Server requests.
///
/// `#[serde(tag = "type")]` gives internally tagged JSON:
/// `{ "type": "Get", "collection": "games", "id": "abc" }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreRequest {
    /// First message on every connection.
    Hello { version: u32 },

    /// Create a document with a server-generated id.
    Create { collection: String, data: Document },

    /// Read a document once.
    Get { collection: String, id: DocumentId },

    /// Apply field updates to an existing document.
    Update {
        collection: String,
        id: DocumentId,
        fields: Vec<FieldUpdate>,
    },

    /// Start receiving snapshots of a document.
    Watch { collection: String, id: DocumentId },

    /// Stop a watch started earlier on this connection.
    Unwatch { watch_id: WatchId },
}

/// Server → Client replies. Each reply carries the `seq` of the request it
/// answers in its envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum StoreReply {
    /// Handshake accepted. `server_time` is milliseconds since the epoch.
    Welcome { server_time: u64 },

    /// Document created.
    Created { id: DocumentId },

    /// Result of a `Get`. `None` if the document doesn't exist.
    Document { data: Option<Document> },

    /// Update committed.
    Updated,

    /// Watch registered; snapshots will follow under this id.
    Watching { watch_id: WatchId },

    /// Watch removed.
    Unwatched,

    /// Something went wrong. `code` follows HTTP conventions
    /// (400 bad request, 404 not found, 503 unavailable).
    Error { code: u16, message: String },
}

/// Server → Client push: the full current content of a watched document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotEvent {
    pub watch_id: WatchId,
    pub id: DocumentId,
    pub data: Document,
}

/// The content of an envelope.
///
/// Adjacently tagged so a receiver can dispatch on `type` before looking
/// at `data`:
/// `{ "type": "Request", "data": { "type": "Hello", "version": 1 } }`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum Payload {
    Request(StoreRequest),
    Reply(StoreReply),
    Snapshot(SnapshotEvent),
}

/// The top-level wire message.
///
/// `seq` is chosen by the client for requests and echoed by the server on
/// the matching reply. Snapshot envelopes carry `seq: 0`; they are matched
/// by `watch_id` instead.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    pub seq: u64,
    pub payload: Payload,
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! The store server and client are separate processes that may not
    //! share a build, so these pin the JSON shapes.

    use super::*;
    use serde_json::json;

    #[test]
    fn test_user_id_serializes_as_plain_string() {
        let json = serde_json::to_string(&UserId::new("alice")).unwrap();
        assert_eq!(json, "\"alice\"");
    }

    #[test]
    fn test_watch_id_display() {
        assert_eq!(WatchId(3).to_string(), "W-3");
    }

    #[test]
    fn test_field_update_set_json_format() {
        let update = FieldUpdate::set("board.4", "X");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(
            json,
            json!({ "path": "board.4", "value": { "op": "set", "value": "X" } })
        );
    }

    #[test]
    fn test_field_update_delete_json_format() {
        let json = serde_json::to_value(FieldUpdate::delete("winner")).unwrap();
        assert_eq!(json, json!({ "path": "winner", "value": { "op": "delete" } }));
    }

    #[test]
    fn test_request_is_internally_tagged() {
        let req = StoreRequest::Watch {
            collection: "games".into(),
            id: DocumentId::new("abc"),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["type"], "Watch");
        assert_eq!(json["collection"], "games");
        assert_eq!(json["id"], "abc");
    }

    #[test]
    fn test_envelope_payload_is_adjacently_tagged() {
        let env = Envelope {
            seq: 4,
            payload: Payload::Reply(StoreReply::Updated),
        };
        let json = serde_json::to_value(&env).unwrap();
        assert_eq!(json, json!({ "seq": 4, "payload": { "type": "Reply", "data": { "type": "Updated" } } }));
    }

    #[test]
    fn test_snapshot_envelope_decodes() {
        let raw = json!({
            "seq": 0,
            "payload": {
                "type": "Snapshot",
                "data": { "watch_id": 9, "id": "g1", "data": { "board": [] } }
            }
        });
        let env: Envelope = serde_json::from_value(raw).unwrap();
        match env.payload {
            Payload::Snapshot(ev) => {
                assert_eq!(ev.watch_id, WatchId(9));
                assert_eq!(ev.id.as_str(), "g1");
                assert!(ev.data.contains_key("board"));
            }
            other => panic!("expected Snapshot, got {other:?}"),
        }
    }
}
