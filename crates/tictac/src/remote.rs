//! `RemoteStore`: a [`DocumentStore`] that lives on a [`StoreServer`].
//!
//! One WebSocket connection carries every request and every watch. A driver
//! task owns the read side: it matches replies to waiting requests by
//! `seq` and routes snapshots to subscriptions by watch id. Requests are
//! written directly by the calling task.
//!
//! [`StoreServer`]: crate::StoreServer

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tictac_protocol::{
    Codec, Document, DocumentId, Envelope, FieldUpdate, JsonCodec, Payload,
    ProtocolError, StoreReply, StoreRequest, WatchId, PROTOCOL_VERSION,
};
use tictac_store::{
    snapshot_channel, DocumentSnapshot, DocumentStore, SnapshotSender, StoreError,
    Subscription, DEFAULT_SNAPSHOT_BUFFER,
};
use tictac_transport::{ClientConnection, Connection};
use tokio::sync::{mpsc, oneshot, Mutex};

use crate::TictacError;

/// A request waiting for its reply.
struct Pending {
    reply: oneshot::Sender<StoreReply>,
    /// Set for `Watch` requests: where the watch's snapshots go once the
    /// server confirms it.
    snapshots: Option<SnapshotSender>,
}

struct Shared {
    conn: ClientConnection,
    codec: JsonCodec,
    next_seq: AtomicU64,
    pending: Mutex<HashMap<u64, Pending>>,
    /// Set by the driver when the connection is gone. Checked under the
    /// `pending` lock so no request is left waiting forever.
    closed: AtomicBool,
}

/// A connection to a remote document store.
///
/// Cheap to clone: clones share the connection. The connection's tasks
/// stop when it closes; after that every call fails with
/// [`StoreError::Unavailable`] and open subscriptions end.
#[derive(Clone)]
pub struct RemoteStore {
    shared: Arc<Shared>,
    unwatch: mpsc::UnboundedSender<WatchId>,
    server_time: u64,
}

impl RemoteStore {
    /// Connects to a store server at `url` (e.g. `ws://127.0.0.1:9001`)
    /// and performs the `Hello` handshake.
    ///
    /// # Errors
    /// Fails if the connection can't be opened or the server rejects the
    /// handshake (wrong protocol version).
    pub async fn connect(url: &str) -> Result<Self, TictacError> {
        let conn = ClientConnection::connect(url).await?;
        let codec = JsonCodec;

        let hello = Envelope {
            seq: 0,
            payload: Payload::Request(StoreRequest::Hello {
                version: PROTOCOL_VERSION,
            }),
        };
        conn.send(&codec.encode(&hello)?).await?;

        let data = conn.recv().await?.ok_or(StoreError::Unavailable)?;
        let envelope: Envelope = codec.decode(&data)?;
        let server_time = match envelope.payload {
            Payload::Reply(StoreReply::Welcome { server_time }) => server_time,
            Payload::Reply(StoreReply::Error { code, message }) => {
                return Err(StoreError::Remote { code, message }.into());
            }
            other => {
                return Err(ProtocolError::InvalidMessage(format!(
                    "expected Welcome, got {other:?}"
                ))
                .into());
            }
        };
        tracing::info!(%url, conn_id = %conn.id(), "connected to store");

        let shared = Arc::new(Shared {
            conn,
            codec,
            next_seq: AtomicU64::new(1),
            pending: Mutex::new(HashMap::new()),
            closed: AtomicBool::new(false),
        });
        let (unwatch_tx, unwatch_rx) = mpsc::unbounded_channel();
        tokio::spawn(drive(Arc::clone(&shared)));
        tokio::spawn(release_watches(Arc::clone(&shared), unwatch_rx));

        Ok(Self {
            shared,
            unwatch: unwatch_tx,
            server_time,
        })
    }

    /// The server clock at handshake, in milliseconds since the epoch.
    pub fn server_time(&self) -> u64 {
        self.server_time
    }

    /// Returns `true` once the connection to the server is gone.
    pub fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::Acquire)
    }

    /// Closes the connection. Pending requests fail and subscriptions end.
    pub async fn close(&self) -> Result<(), TictacError> {
        self.shared.conn.close().await?;
        Ok(())
    }

    /// Sends `request` and waits for its reply.
    ///
    /// `Error` replies are returned as-is; callers turn them into the
    /// right [`StoreError`].
    async fn request(
        &self,
        request: StoreRequest,
        snapshots: Option<SnapshotSender>,
    ) -> Result<StoreReply, StoreError> {
        let seq = self.shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let (reply_tx, reply_rx) = oneshot::channel();
        {
            let mut pending = self.shared.pending.lock().await;
            if self.is_closed() {
                return Err(StoreError::Unavailable);
            }
            pending.insert(
                seq,
                Pending {
                    reply: reply_tx,
                    snapshots,
                },
            );
        }

        let envelope = Envelope {
            seq,
            payload: Payload::Request(request),
        };
        let sent = match self.shared.codec.encode(&envelope) {
            Ok(bytes) => self
                .shared
                .conn
                .send(&bytes)
                .await
                .map_err(|_| StoreError::Unavailable),
            Err(e) => Err(e.into()),
        };
        if let Err(e) = sent {
            self.shared.pending.lock().await.remove(&seq);
            return Err(e);
        }

        reply_rx.await.map_err(|_| StoreError::Unavailable)
    }
}

/// Turns an `Error` reply (or a reply of the wrong kind) into a
/// [`StoreError`]. `404` becomes `NotFound` for the document asked about.
fn reply_error(reply: StoreReply, collection: &str, id: Option<&DocumentId>) -> StoreError {
    match reply {
        StoreReply::Error { code: 404, message } => match id {
            Some(id) => StoreError::NotFound {
                collection: collection.to_string(),
                id: id.clone(),
            },
            None => StoreError::Remote { code: 404, message },
        },
        StoreReply::Error { code: 503, .. } => StoreError::Unavailable,
        StoreReply::Error { code, message } => StoreError::Remote { code, message },
        other => ProtocolError::InvalidMessage(format!("unexpected reply {other:?}")).into(),
    }
}

impl DocumentStore for RemoteStore {
    async fn create(
        &self,
        collection: &str,
        data: Document,
    ) -> Result<DocumentId, StoreError> {
        let request = StoreRequest::Create {
            collection: collection.to_string(),
            data,
        };
        match self.request(request, None).await? {
            StoreReply::Created { id } => Ok(id),
            other => Err(reply_error(other, collection, None)),
        }
    }

    async fn get(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let request = StoreRequest::Get {
            collection: collection.to_string(),
            id: id.clone(),
        };
        match self.request(request, None).await? {
            StoreReply::Document { data } => Ok(data),
            other => Err(reply_error(other, collection, Some(id))),
        }
    }

    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), StoreError> {
        let request = StoreRequest::Update {
            collection: collection.to_string(),
            id: id.clone(),
            fields: updates,
        };
        match self.request(request, None).await? {
            StoreReply::Updated => Ok(()),
            other => Err(reply_error(other, collection, Some(id))),
        }
    }

    async fn subscribe(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Subscription, StoreError> {
        let (sender, receiver) = snapshot_channel(DEFAULT_SNAPSHOT_BUFFER);
        let request = StoreRequest::Watch {
            collection: collection.to_string(),
            id: id.clone(),
        };
        match self.request(request, Some(sender)).await? {
            StoreReply::Watching { watch_id } => Ok(Subscription::new(
                watch_id,
                id.clone(),
                receiver,
                self.unwatch.clone(),
            )),
            other => Err(reply_error(other, collection, Some(id))),
        }
    }
}

/// The read side of the connection. Runs until the connection closes.
async fn drive(shared: Arc<Shared>) {
    let conn_id = shared.conn.id();
    let mut routes: HashMap<WatchId, SnapshotSender> = HashMap::new();

    loop {
        let data = match shared.conn.recv().await {
            Ok(Some(data)) => data,
            Ok(None) => {
                tracing::info!(%conn_id, "store connection closed");
                break;
            }
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "store connection failed");
                break;
            }
        };
        let envelope: Envelope = match shared.codec.decode(&data) {
            Ok(env) => env,
            Err(e) => {
                tracing::warn!(%conn_id, error = %e, "undecodable frame from store");
                continue;
            }
        };

        match envelope.payload {
            Payload::Reply(reply) => {
                let Some(pending) = shared.pending.lock().await.remove(&envelope.seq)
                else {
                    // Replies to fire-and-forget `Unwatch` requests land here.
                    tracing::debug!(%conn_id, seq = envelope.seq, "unsolicited reply");
                    continue;
                };
                // The route must exist before the next frame is read: the
                // watch's first snapshot follows right behind this reply.
                if let (StoreReply::Watching { watch_id }, Some(snapshots)) =
                    (&reply, pending.snapshots)
                {
                    routes.insert(*watch_id, snapshots);
                }
                let _ = pending.reply.send(reply);
            }
            Payload::Snapshot(event) => {
                let Some(route) = routes.get(&event.watch_id) else {
                    tracing::debug!(%conn_id, watch_id = %event.watch_id, "snapshot for unknown watch");
                    continue;
                };
                let snapshot = DocumentSnapshot {
                    id: event.id,
                    data: event.data,
                };
                if route.send(snapshot).is_err() {
                    // Subscription cancelled; its Unwatch is on the way.
                    routes.remove(&event.watch_id);
                }
            }
            Payload::Request(_) => {
                tracing::warn!(%conn_id, "store sent a request, ignoring");
            }
        }
    }

    // Fail everything still waiting. Subscriptions end when `routes` drops.
    shared.closed.store(true, Ordering::Release);
    let abandoned = {
        let mut pending = shared.pending.lock().await;
        let count = pending.len();
        pending.clear();
        count
    };
    tracing::debug!(%conn_id, abandoned, watches = routes.len(), "store driver stopped");
}

/// Tells the server about cancelled subscriptions.
async fn release_watches(
    shared: Arc<Shared>,
    mut unwatch: mpsc::UnboundedReceiver<WatchId>,
) {
    while let Some(watch_id) = unwatch.recv().await {
        if shared.closed.load(Ordering::Acquire) {
            continue;
        }
        let seq = shared.next_seq.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope {
            seq,
            payload: Payload::Request(StoreRequest::Unwatch { watch_id }),
        };
        let result = match shared.codec.encode(&envelope) {
            Ok(bytes) => shared.conn.send(&bytes).await.map_err(TictacError::from),
            Err(e) => Err(e.into()),
        };
        match result {
            Ok(()) => tracing::debug!(%watch_id, "unwatch sent"),
            Err(e) => tracing::debug!(%watch_id, error = %e, "unwatch not sent"),
        }
    }
}
