//! Codec trait and the JSON implementation.
//!
//! A codec turns store envelopes into frame bytes and back. The transport
//! only ever sees bytes; the store server and client only ever see
//! [`Envelope`](crate::Envelope)s. Keeping the two apart means a binary
//! format could be dropped in later without touching either side.
//!
//! Documents themselves are already JSON objects (`serde_json::Map`), so
//! JSON is the natural wire format today: a frame can be read straight out
//! of a log line or a browser's network tab.

use serde::{de::DeserializeOwned, Serialize};

use crate::ProtocolError;

/// Encodes values to bytes and decodes bytes back.
///
/// ## Trait bounds
///
/// - `Send + Sync`: one codec instance is shared by every connection task
///   of a server, and Tokio may poll those tasks on any worker thread.
/// - `'static`: the codec owns everything it needs, so it can live inside
///   a spawned task for as long as the connection does.
///
/// ## Generic methods
///
/// `encode` and `decode` are generic over the value type, so the same codec
/// handles envelopes, documents, or anything else with serde impls.
/// `decode` asks for `DeserializeOwned` rather than `Deserialize<'de>`: the
/// result may not borrow from `data`, because the frame buffer is dropped as
/// soon as decoding finishes.
///
/// Generic methods make the trait unusable as `dyn Codec`. Callers hold a
/// concrete codec (or a type parameter) instead.
pub trait Codec: Send + Sync + 'static {
    /// Serializes a value into bytes.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError>;

    /// Deserializes bytes back into a value.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if the bytes are malformed or don't
    /// match the expected type.
    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError>;
}

/// A [`Codec`] backed by `serde_json`.
///
/// Zero-sized and `Copy`: cloning it into every connection task costs
/// nothing.
///
/// ```rust
/// use tictac_protocol::{Codec, Envelope, JsonCodec, Payload, StoreRequest};
///
/// let codec = JsonCodec;
/// let envelope = Envelope {
///     seq: 1,
///     payload: Payload::Request(StoreRequest::Hello { version: 1 }),
/// };
///
/// let bytes = codec.encode(&envelope).unwrap();
/// let decoded: Envelope = codec.decode(&bytes).unwrap();
/// assert_eq!(envelope, decoded);
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonCodec;

impl Codec for JsonCodec {
    fn encode<T: Serialize>(&self, value: &T) -> Result<Vec<u8>, ProtocolError> {
        serde_json::to_vec(value).map_err(ProtocolError::Encode)
    }

    fn decode<T: DeserializeOwned>(
        &self,
        data: &[u8],
    ) -> Result<T, ProtocolError> {
        serde_json::from_slice(data).map_err(ProtocolError::Decode)
    }
}
