//! In-process document store: a Tokio task that owns every document.
//!
//! All reads, writes and watch registrations go through one command
//! channel and are handled one at a time, so commits are totally ordered
//! and every watcher sees them in the same order.
//!
//! ```text
//!  MemoryStore (clone) ──┐
//!  MemoryStore (clone) ──┼──→ commands (bounded) ──→ StoreActor
//!  Subscription::drop  ──┴──→ unwatch (unbounded) ──┘     │
//!                                                         │ publish
//!                                      SnapshotSender ←───┘
//!                                            │
//!                                      Subscription::next
//! ```
//!
//! # Concurrency note
//!
//! The documents live in a plain `HashMap` owned by the actor. Nothing is
//! shared, so there are no locks: a command's reply is sent only after its
//! commit has been published to every watcher. A caller that awaits
//! `update` and then reads its own subscription therefore always finds the
//! new snapshot queued.
//!
//! Publishing never waits on a watcher. Each watch has its own bounded
//! queue (see [`snapshot_channel`](crate::snapshot_channel)), so one stalled
//! subscriber cannot hold up the others or the writers.

use std::collections::HashMap;

use tictac_protocol::{Document, DocumentId, FieldUpdate, WatchId};
use tokio::sync::{mpsc, oneshot};

use crate::{
    apply_updates, generate_id, snapshot_channel, DocumentSnapshot,
    DocumentStore, SnapshotSender, StoreConfig, StoreError, Subscription,
};

type Reply<T> = oneshot::Sender<Result<T, StoreError>>;

/// Commands sent to the store actor. Each carries a reply channel except
/// `Shutdown`.
enum StoreCommand {
    Create {
        collection: String,
        data: Document,
        reply: Reply<DocumentId>,
    },
    Get {
        collection: String,
        id: DocumentId,
        reply: Reply<Option<Document>>,
    },
    Update {
        collection: String,
        id: DocumentId,
        updates: Vec<FieldUpdate>,
        reply: Reply<()>,
    },
    Watch {
        collection: String,
        id: DocumentId,
        sender: SnapshotSender,
        reply: Reply<WatchId>,
    },
    Shutdown,
}

/// Handle to a running in-memory store.
///
/// Cheap to clone: every clone talks to the same actor. The actor stops
/// when [`shutdown`](Self::shutdown) is called or the last handle is
/// dropped; open subscriptions then end.
#[derive(Clone)]
pub struct MemoryStore {
    commands: mpsc::Sender<StoreCommand>,
    unwatch: mpsc::UnboundedSender<WatchId>,
    snapshot_buffer: usize,
}

impl MemoryStore {
    /// Spawns the store actor on the current Tokio runtime.
    pub fn spawn(config: StoreConfig) -> Self {
        let (commands_tx, commands_rx) = mpsc::channel(config.channel_size);
        let (unwatch_tx, unwatch_rx) = mpsc::unbounded_channel();
        let snapshot_buffer = config.snapshot_buffer;

        let actor = StoreActor {
            config,
            collections: HashMap::new(),
            watchers: HashMap::new(),
            next_watch_id: 1,
            commands: commands_rx,
            unwatch: unwatch_rx,
        };
        tokio::spawn(actor.run());

        Self {
            commands: commands_tx,
            unwatch: unwatch_tx,
            snapshot_buffer,
        }
    }

    /// Stops the actor. Outstanding subscriptions end; later calls fail
    /// with [`StoreError::Unavailable`].
    pub async fn shutdown(&self) -> Result<(), StoreError> {
        self.commands
            .send(StoreCommand::Shutdown)
            .await
            .map_err(|_| StoreError::Unavailable)
    }

    /// Sends a command built around a fresh reply channel and waits for
    /// the answer.
    async fn request<T>(
        &self,
        build: impl FnOnce(Reply<T>) -> StoreCommand,
    ) -> Result<T, StoreError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.commands
            .send(build(reply_tx))
            .await
            .map_err(|_| StoreError::Unavailable)?;
        reply_rx.await.map_err(|_| StoreError::Unavailable)?
    }
}

impl DocumentStore for MemoryStore {
    async fn create(
        &self,
        collection: &str,
        data: Document,
    ) -> Result<DocumentId, StoreError> {
        let collection = collection.to_string();
        self.request(|reply| StoreCommand::Create {
            collection,
            data,
            reply,
        })
        .await
    }

    async fn get(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, StoreError> {
        let collection = collection.to_string();
        let id = id.clone();
        self.request(|reply| StoreCommand::Get {
            collection,
            id,
            reply,
        })
        .await
    }

    async fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        updates: Vec<FieldUpdate>,
    ) -> Result<(), StoreError> {
        let collection = collection.to_string();
        let id = id.clone();
        self.request(|reply| StoreCommand::Update {
            collection,
            id,
            updates,
            reply,
        })
        .await
    }

    async fn subscribe(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Subscription, StoreError> {
        let (sender, receiver) = snapshot_channel(self.snapshot_buffer);
        let collection = collection.to_string();
        let document_id = id.clone();
        let watch_id = self
            .request(|reply| StoreCommand::Watch {
                collection,
                id: document_id.clone(),
                sender,
                reply,
            })
            .await?;
        Ok(Subscription::new(
            watch_id,
            document_id,
            receiver,
            self.unwatch.clone(),
        ))
    }
}

struct Watcher {
    collection: String,
    id: DocumentId,
    sender: SnapshotSender,
}

/// The actor state. Runs inside a Tokio task.
struct StoreActor {
    config: StoreConfig,
    collections: HashMap<String, HashMap<DocumentId, Document>>,
    watchers: HashMap<WatchId, Watcher>,
    next_watch_id: u64,
    commands: mpsc::Receiver<StoreCommand>,
    unwatch: mpsc::UnboundedReceiver<WatchId>,
}

impl StoreActor {
    async fn run(mut self) {
        tracing::info!("memory store started");

        loop {
            tokio::select! {
                // Releases first: a watch cancelled before a commit must
                // not be sent that commit.
                biased;

                Some(watch_id) = self.unwatch.recv() => {
                    if self.watchers.remove(&watch_id).is_some() {
                        tracing::debug!(%watch_id, "watch removed");
                    }
                }
                cmd = self.commands.recv() => {
                    let Some(cmd) = cmd else { break };
                    if !self.handle(cmd) {
                        break;
                    }
                }
            }
        }

        tracing::info!(
            documents = self.collections.values().map(HashMap::len).sum::<usize>(),
            "memory store stopped"
        );
    }

    /// Handles one command. Returns `false` on shutdown.
    fn handle(&mut self, cmd: StoreCommand) -> bool {
        match cmd {
            StoreCommand::Create {
                collection,
                data,
                reply,
            } => {
                let id = self.handle_create(collection, data);
                let _ = reply.send(Ok(id));
            }
            StoreCommand::Get {
                collection,
                id,
                reply,
            } => {
                let doc = self
                    .collections
                    .get(&collection)
                    .and_then(|docs| docs.get(&id))
                    .cloned();
                let _ = reply.send(Ok(doc));
            }
            StoreCommand::Update {
                collection,
                id,
                updates,
                reply,
            } => {
                let result = self.handle_update(&collection, &id, &updates);
                let _ = reply.send(result);
            }
            StoreCommand::Watch {
                collection,
                id,
                sender,
                reply,
            } => {
                let result = self.handle_watch(collection, id, sender);
                let _ = reply.send(result);
            }
            StoreCommand::Shutdown => {
                tracing::info!("memory store shutting down");
                return false;
            }
        }
        true
    }

    fn handle_create(&mut self, collection: String, data: Document) -> DocumentId {
        let docs = self.collections.entry(collection.clone()).or_default();
        let id = loop {
            let candidate = generate_id(self.config.id_length);
            if !docs.contains_key(&candidate) {
                break candidate;
            }
        };
        docs.insert(id.clone(), data);
        tracing::debug!(%collection, %id, "document created");
        id
    }

    fn handle_update(
        &mut self,
        collection: &str,
        id: &DocumentId,
        updates: &[FieldUpdate],
    ) -> Result<(), StoreError> {
        let doc = self
            .collections
            .get_mut(collection)
            .and_then(|docs| docs.get_mut(id))
            .ok_or_else(|| not_found(collection, id))?;
        apply_updates(doc, updates)?;
        tracing::debug!(%collection, %id, fields = updates.len(), "document updated");

        let snapshot = DocumentSnapshot {
            id: id.clone(),
            data: doc.clone(),
        };
        self.publish(collection, snapshot);
        Ok(())
    }

    fn handle_watch(
        &mut self,
        collection: String,
        id: DocumentId,
        sender: SnapshotSender,
    ) -> Result<WatchId, StoreError> {
        let doc = self
            .collections
            .get(&collection)
            .and_then(|docs| docs.get(&id))
            .ok_or_else(|| not_found(&collection, &id))?;

        let watch_id = WatchId(self.next_watch_id);
        self.next_watch_id += 1;

        // Current content goes out before any later commit can.
        let _ = sender.send(DocumentSnapshot {
            id: id.clone(),
            data: doc.clone(),
        });
        tracing::debug!(%collection, %id, %watch_id, "watch added");
        self.watchers.insert(
            watch_id,
            Watcher {
                collection,
                id,
                sender,
            },
        );
        Ok(watch_id)
    }

    /// Sends `snapshot` to every watcher of the document and forgets
    /// watchers whose receiver is gone.
    fn publish(&mut self, collection: &str, snapshot: DocumentSnapshot) {
        self.watchers.retain(|watch_id, watcher| {
            if watcher.collection != collection || watcher.id != snapshot.id {
                return true;
            }
            let alive = watcher.sender.send(snapshot.clone()).is_ok();
            if !alive {
                tracing::debug!(%watch_id, "dropping closed watch");
            }
            alive
        });
    }
}

fn not_found(collection: &str, id: &DocumentId) -> StoreError {
    StoreError::NotFound {
        collection: collection.to_string(),
        id: id.clone(),
    }
}
