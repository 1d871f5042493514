//! Per-connection handler: handshake, request dispatch, and snapshot push.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Receive `Hello` → check the protocol version → reply `Welcome`
//!   2. Loop: receive request envelopes → run them against the store →
//!      reply with the request's `seq`
//!
//! A `Watch` spawns a forwarder task that pushes `Snapshot` envelopes for
//! as long as the watch lives. Forwarders are aborted on `Unwatch` and
//! when the connection ends, which drops their subscriptions and releases
//! the watches in the store.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tictac_protocol::{
    Codec, Envelope, Payload, ProtocolError, SnapshotEvent,
    StoreReply, StoreRequest, WatchId, PROTOCOL_VERSION,
};
use tictac_store::{now_millis, DocumentStore, StoreError, Subscription};
use tictac_transport::{Connection, ServerConnection};
use tokio::task::JoinHandle;

use crate::server::ServerState;
use crate::TictacError;

/// Time a client has to send `Hello` after connecting.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// The live watches of one connection.
///
/// Aborts every forwarder when dropped, so watches are released even if
/// the handler exits early with an error.
#[derive(Default)]
struct Watches(HashMap<WatchId, JoinHandle<()>>);

impl Drop for Watches {
    fn drop(&mut self) {
        for (_, forwarder) in self.0.drain() {
            forwarder.abort();
        }
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<C: Codec>(
    conn: ServerConnection,
    state: Arc<ServerState<C>>,
) -> Result<(), TictacError> {
    let conn = Arc::new(conn);
    let conn_id = conn.id();
    tracing::debug!(%conn_id, "handling new connection");

    perform_handshake(&conn, &state).await?;
    tracing::info!(%conn_id, "client connected");

    let mut watches = Watches::default();

    loop {
        let data = match conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "connection closed cleanly");
                break;
            }
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "recv error");
                break;
            }
        };

        let envelope: Envelope = match state.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "failed to decode envelope");
                send_reply(&conn, &state.codec, 0, error_reply(400, &e.to_string()))
                    .await?;
                continue;
            }
        };

        let seq = envelope.seq;
        let (reply, started) = match envelope.payload {
            Payload::Request(request) => {
                handle_request(&state, &mut watches, request).await
            }
            _ => (error_reply(400, "expected a request"), None),
        };
        send_reply(&conn, &state.codec, seq, reply).await?;

        // Only after `Watching` is on the wire, so the client knows the
        // watch id before its first snapshot arrives.
        if let Some(subscription) = started {
            let watch_id = subscription.watch_id();
            let forwarder = spawn_forwarder(
                Arc::clone(&conn),
                Arc::clone(&state),
                subscription,
            );
            watches.0.insert(watch_id, forwarder);
        }
    }

    // `watches` drops here → forwarders abort → watches released.
    tracing::debug!(%conn_id, watches = watches.0.len(), "connection handler done");
    Ok(())
}

/// Receives `Hello`, checks the version, and replies `Welcome`.
async fn perform_handshake<C: Codec>(
    conn: &ServerConnection,
    state: &ServerState<C>,
) -> Result<(), TictacError> {
    let data = match tokio::time::timeout(HANDSHAKE_TIMEOUT, conn.recv()).await {
        Ok(Ok(Some(data))) => data,
        Ok(Ok(None)) => {
            return Err(ProtocolError::InvalidMessage(
                "connection closed before handshake".into(),
            )
            .into());
        }
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => {
            return Err(
                ProtocolError::InvalidMessage("handshake timed out".into()).into()
            );
        }
    };

    let envelope: Envelope = state.codec.decode(&data)?;
    let version = match envelope.payload {
        Payload::Request(StoreRequest::Hello { version }) => version,
        _ => {
            send_reply(conn, &state.codec, envelope.seq, error_reply(400, "expected Hello"))
                .await?;
            return Err(ProtocolError::InvalidMessage(
                "first message must be Hello".into(),
            )
            .into());
        }
    };

    if version != PROTOCOL_VERSION {
        tracing::warn!(
            conn_id = %conn.id(),
            version,
            expected = PROTOCOL_VERSION,
            "rejecting client with wrong protocol version"
        );
        let message =
            format!("version mismatch: expected {PROTOCOL_VERSION}, got {version}");
        send_reply(conn, &state.codec, envelope.seq, error_reply(400, &message))
            .await?;
        conn.close().await?;
        return Err(ProtocolError::InvalidMessage(
            "protocol version mismatch".into(),
        )
        .into());
    }

    let welcome = StoreReply::Welcome {
        server_time: now_millis(),
    };
    send_reply(conn, &state.codec, envelope.seq, welcome).await
}

/// Runs one request against the store and builds the reply.
///
/// A successful `Watch` also returns the new subscription; the caller
/// starts forwarding it once the reply is sent.
async fn handle_request<C: Codec>(
    state: &ServerState<C>,
    watches: &mut Watches,
    request: StoreRequest,
) -> (StoreReply, Option<Subscription>) {
    let store = &state.store;
    let result = match request {
        StoreRequest::Hello { .. } => {
            return (error_reply(400, "already connected"), None);
        }
        StoreRequest::Create { collection, data } => store
            .create(&collection, data)
            .await
            .map(|id| StoreReply::Created { id }),
        StoreRequest::Get { collection, id } => store
            .get(&collection, &id)
            .await
            .map(|data| StoreReply::Document { data }),
        StoreRequest::Update {
            collection,
            id,
            fields,
        } => store
            .update(&collection, &id, fields)
            .await
            .map(|()| StoreReply::Updated),
        StoreRequest::Watch { collection, id } => {
            return match store.subscribe(&collection, &id).await {
                Ok(subscription) => {
                    let watch_id = subscription.watch_id();
                    (StoreReply::Watching { watch_id }, Some(subscription))
                }
                Err(e) => (error_reply(e.code(), &e.to_string()), None),
            };
        }
        StoreRequest::Unwatch { watch_id } => {
            match watches.0.remove(&watch_id) {
                Some(forwarder) => {
                    forwarder.abort();
                    Ok(StoreReply::Unwatched)
                }
                None => {
                    let message = format!("unknown watch {watch_id}");
                    return (error_reply(404, &message), None);
                }
            }
        }
    };

    let reply =
        result.unwrap_or_else(|e: StoreError| error_reply(e.code(), &e.to_string()));
    (reply, None)
}

/// Spawns the task that pushes a watch's snapshots to the client.
fn spawn_forwarder<C: Codec>(
    conn: Arc<ServerConnection>,
    state: Arc<ServerState<C>>,
    mut subscription: Subscription,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let watch_id = subscription.watch_id();
        while let Some(snapshot) = subscription.next().await {
            let envelope = Envelope {
                seq: 0,
                payload: Payload::Snapshot(SnapshotEvent {
                    watch_id,
                    id: snapshot.id,
                    data: snapshot.data,
                }),
            };
            let bytes = match state.codec.encode(&envelope) {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::warn!(%watch_id, error = %e, "failed to encode snapshot");
                    continue;
                }
            };
            if let Err(e) = conn.send(&bytes).await {
                tracing::debug!(%watch_id, error = %e, "snapshot send failed");
                break;
            }
        }
        tracing::debug!(%watch_id, "forwarder stopped");
    })
}

fn error_reply(code: u16, message: &str) -> StoreReply {
    StoreReply::Error {
        code,
        message: message.to_string(),
    }
}

/// Sends a reply envelope carrying `seq`.
async fn send_reply(
    conn: &ServerConnection,
    codec: &impl Codec,
    seq: u64,
    reply: StoreReply,
) -> Result<(), TictacError> {
    let envelope = Envelope {
        seq,
        payload: Payload::Reply(reply),
    };
    let bytes = codec.encode(&envelope)?;
    conn.send(&bytes).await?;
    Ok(())
}
