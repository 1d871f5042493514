//! The generic document store contract.

use std::future::Future;

use tictac_protocol::{Document, DocumentId, FieldUpdate, WatchId};
use tokio::sync::mpsc;

use crate::{SnapshotReceiver, StoreError};

/// One delivery on a [`Subscription`]: the full content of the watched
/// document right after a commit.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentSnapshot {
    pub id: DocumentId,
    pub data: Document,
}

/// A store of JSON documents grouped into collections.
///
/// Implemented in-process by [`MemoryStore`](crate::MemoryStore) and over
/// the network by the facade's `RemoteStore`. Higher layers are generic
/// over this trait, so the game logic never knows which one it talks to.
///
/// ## Why `impl Future + Send`
///
/// Async fns in traits are allowed, but their futures carry no `Send`
/// bound, and callers such as the store server spawn these calls onto the
/// multi-threaded runtime. Spelling the return type out as
/// `impl Future<Output = ...> + Send` puts the bound in the contract.
/// Implementors still just write `async fn`; the compiler checks that
/// their future is `Send`.
///
/// `Send + Sync + 'static` on the trait itself lets a store handle be
/// cloned into spawned tasks and shared across them.
///
/// ## Errors
///
/// Every method fails with [`StoreError::Unavailable`] once the backend is
/// gone (actor stopped, connection closed). Nothing is retried here;
/// retrying is the caller's decision.
pub trait DocumentStore: Send + Sync + 'static {
    /// Creates a document under a freshly generated id and returns the id.
    fn create(
        &self,
        collection: &str,
        data: Document,
    ) -> impl Future<Output = Result<DocumentId, StoreError>> + Send;

    /// Reads a document once. `Ok(None)` if it doesn't exist.
    fn get(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> impl Future<Output = Result<Option<Document>, StoreError>> + Send;

    /// Applies field updates to an existing document as one commit.
    ///
    /// Fails with [`StoreError::NotFound`] if the document doesn't exist.
    fn update(
        &self,
        collection: &str,
        id: &DocumentId,
        updates: Vec<FieldUpdate>,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Starts watching a document.
    ///
    /// The current content is delivered first, then one snapshot per
    /// committed update, in commit order. Fails with
    /// [`StoreError::NotFound`] if the document doesn't exist.
    fn subscribe(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> impl Future<Output = Result<Subscription, StoreError>> + Send;
}

/// A live watch on one document.
///
/// The subscription is its own cancellation handle. [`cancel`](Self::cancel)
/// or dropping it stops delivery at once: the receiver is closed before the
/// backend hears about it, so no snapshot is observed after cancellation
/// even if one was already in flight.
///
/// Snapshots arrive through a [`SnapshotReceiver`], which holds a bounded
/// number of them and drops superseded ones if the subscriber falls
/// behind. Releasing the watch in the backend goes over an unbounded
/// channel, so cancelling never waits.
#[derive(Debug)]
pub struct Subscription {
    watch_id: WatchId,
    document_id: DocumentId,
    receiver: SnapshotReceiver,
    unwatch: Option<mpsc::UnboundedSender<WatchId>>,
}

impl Subscription {
    /// Assembles a subscription. Backends call this when they register a
    /// watch; `unwatch` receives `watch_id` once when it is released.
    pub fn new(
        watch_id: WatchId,
        document_id: DocumentId,
        receiver: SnapshotReceiver,
        unwatch: mpsc::UnboundedSender<WatchId>,
    ) -> Self {
        Self {
            watch_id,
            document_id,
            receiver,
            unwatch: Some(unwatch),
        }
    }

    /// The backend's id for this watch.
    pub fn watch_id(&self) -> WatchId {
        self.watch_id
    }

    /// The watched document.
    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Waits for the next snapshot.
    ///
    /// Returns `None` once the subscription is cancelled or the backend
    /// has gone away.
    pub async fn next(&mut self) -> Option<DocumentSnapshot> {
        if self.unwatch.is_none() {
            return None;
        }
        self.receiver.recv().await
    }

    /// Returns a snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<DocumentSnapshot> {
        if self.unwatch.is_none() {
            return None;
        }
        self.receiver.try_recv()
    }

    /// Stops delivery and releases the watch in the backend.
    pub fn cancel(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(unwatch) = self.unwatch.take() {
            self.receiver.close();
            tracing::debug!(
                watch_id = %self.watch_id,
                document_id = %self.document_id,
                "subscription released"
            );
            // The backend may already be gone; nothing left to release then.
            let _ = unwatch.send(self.watch_id);
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.release();
    }
}
