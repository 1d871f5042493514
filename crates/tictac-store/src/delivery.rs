//! Per-watch snapshot queues.
//!
//! Every watch gets its own queue between the store and the subscriber.
//! The store must never wait on a subscriber (a slow client would stall
//! every commit), yet the queue can't grow without limit either.
//!
//! Snapshots are whole documents, so an older one carries nothing a newer
//! one doesn't. When a queue is full the **oldest** snapshot is dropped to
//! make room. A subscriber that falls behind may skip intermediate states,
//! but it always receives them in commit order and always ends on the
//! latest commit.
//!
//! ```text
//! capacity 2, subscriber asleep:
//!   commit 1 → [1]
//!   commit 2 → [1, 2]
//!   commit 3 → [2, 3]      1 superseded
//! subscriber wakes → 2, 3
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::DocumentSnapshot;

#[derive(Debug)]
struct Queue {
    snapshots: VecDeque<DocumentSnapshot>,
    capacity: usize,
    sender_alive: bool,
    receiver_open: bool,
}

#[derive(Debug)]
struct Shared {
    queue: Mutex<Queue>,
    /// Wakes the single receiver. `notify_one` keeps a permit when nobody
    /// is waiting, so a push between the receiver's check and its wait is
    /// not lost.
    notify: Notify,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Creates a queue holding at most `capacity` snapshots (at least one).
pub fn snapshot_channel(capacity: usize) -> (SnapshotSender, SnapshotReceiver) {
    let shared = Arc::new(Shared {
        queue: Mutex::new(Queue {
            snapshots: VecDeque::new(),
            capacity: capacity.max(1),
            sender_alive: true,
            receiver_open: true,
        }),
        notify: Notify::new(),
    });
    (
        SnapshotSender {
            shared: Arc::clone(&shared),
        },
        SnapshotReceiver { shared },
    )
}

/// The store's end of a watch queue.
///
/// Dropping it ends the subscription once the queued snapshots are read.
#[derive(Debug)]
pub struct SnapshotSender {
    shared: Arc<Shared>,
}

impl SnapshotSender {
    /// Queues `snapshot` without waiting.
    ///
    /// If the queue is full the oldest snapshot is discarded. Hands
    /// `snapshot` back if the receiver is gone, so the caller can forget
    /// the watch.
    pub fn send(&self, snapshot: DocumentSnapshot) -> Result<(), DocumentSnapshot> {
        {
            let mut queue = self.shared.lock();
            if !queue.receiver_open {
                return Err(snapshot);
            }
            if queue.snapshots.len() >= queue.capacity {
                queue.snapshots.pop_front();
                tracing::debug!(
                    id = %snapshot.id,
                    capacity = queue.capacity,
                    "subscriber behind, dropped superseded snapshot"
                );
            }
            queue.snapshots.push_back(snapshot);
        }
        self.shared.notify.notify_one();
        Ok(())
    }

    /// Returns `true` once the receiver has been closed or dropped.
    pub fn is_closed(&self) -> bool {
        !self.shared.lock().receiver_open
    }
}

impl Drop for SnapshotSender {
    fn drop(&mut self) {
        self.shared.lock().sender_alive = false;
        self.shared.notify.notify_one();
    }
}

/// The subscriber's end of a watch queue.
#[derive(Debug)]
pub struct SnapshotReceiver {
    shared: Arc<Shared>,
}

impl SnapshotReceiver {
    /// Waits for the next snapshot. `None` once the queue is closed, or
    /// the sender is gone and everything queued has been read.
    ///
    /// Cancel-safe: snapshots stay queued until returned.
    pub async fn recv(&mut self) -> Option<DocumentSnapshot> {
        loop {
            {
                let mut queue = self.shared.lock();
                if !queue.receiver_open {
                    return None;
                }
                if let Some(snapshot) = queue.snapshots.pop_front() {
                    return Some(snapshot);
                }
                if !queue.sender_alive {
                    return None;
                }
            }
            self.shared.notify.notified().await;
        }
    }

    /// Returns a queued snapshot without waiting.
    pub fn try_recv(&mut self) -> Option<DocumentSnapshot> {
        let mut queue = self.shared.lock();
        if !queue.receiver_open {
            return None;
        }
        queue.snapshots.pop_front()
    }

    /// Closes the queue. Queued snapshots are discarded and later sends
    /// fail.
    pub fn close(&mut self) {
        let mut queue = self.shared.lock();
        queue.receiver_open = false;
        queue.snapshots.clear();
    }
}

impl Drop for SnapshotReceiver {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tictac_protocol::{Document, DocumentId};

    fn snapshot(n: u64) -> DocumentSnapshot {
        let mut data = Document::new();
        data.insert("n".into(), n.into());
        DocumentSnapshot {
            id: DocumentId::new("g"),
            data,
        }
    }

    fn n(snapshot: Option<DocumentSnapshot>) -> Option<u64> {
        snapshot.and_then(|s| s.data["n"].as_u64())
    }

    #[tokio::test]
    async fn test_recv_in_send_order() {
        let (tx, mut rx) = snapshot_channel(4);
        tx.send(snapshot(1)).unwrap();
        tx.send(snapshot(2)).unwrap();
        assert_eq!(n(rx.recv().await), Some(1));
        assert_eq!(n(rx.recv().await), Some(2));
        assert_eq!(n(rx.try_recv()), None);
    }

    #[test]
    fn test_full_queue_drops_oldest_keeps_latest() {
        let (tx, mut rx) = snapshot_channel(2);
        for i in 1..=5 {
            tx.send(snapshot(i)).unwrap();
        }
        assert_eq!(n(rx.try_recv()), Some(4));
        assert_eq!(n(rx.try_recv()), Some(5));
        assert_eq!(n(rx.try_recv()), None);
    }

    #[test]
    fn test_zero_capacity_holds_one() {
        let (tx, mut rx) = snapshot_channel(0);
        tx.send(snapshot(1)).unwrap();
        tx.send(snapshot(2)).unwrap();
        assert_eq!(n(rx.try_recv()), Some(2));
    }

    #[tokio::test]
    async fn test_recv_wakes_on_send() {
        let (tx, mut rx) = snapshot_channel(4);
        let waiter = tokio::spawn(async move { n(rx.recv().await) });
        tokio::time::sleep(Duration::from_millis(10)).await;
        tx.send(snapshot(7)).unwrap();
        assert_eq!(waiter.await.unwrap(), Some(7));
    }

    #[tokio::test]
    async fn test_dropped_sender_drains_then_ends() {
        let (tx, mut rx) = snapshot_channel(4);
        tx.send(snapshot(1)).unwrap();
        drop(tx);
        assert_eq!(n(rx.recv().await), Some(1));
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn test_send_after_close_returns_snapshot() {
        let (tx, mut rx) = snapshot_channel(4);
        tx.send(snapshot(1)).unwrap();
        rx.close();
        assert!(tx.is_closed());
        assert_eq!(n(tx.send(snapshot(2)).err()), Some(2));
        assert_eq!(n(rx.try_recv()), None);
    }

    #[test]
    fn test_dropped_receiver_closes_sender() {
        let (tx, rx) = snapshot_channel(4);
        drop(rx);
        assert!(tx.send(snapshot(1)).is_err());
    }
}
