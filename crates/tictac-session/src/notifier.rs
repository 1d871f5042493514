//! Local reminders.
//!
//! When the player puts the game aside, a reminder to come back is
//! scheduled; picking the game up again (or making a move) cancels it.
//! The binder only ever schedules or cancels. Presenting the reminder is
//! somebody else's job.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// The boundary to the local notification service. Fire-and-forget: both
/// methods return immediately and never fail.
pub trait Notifier: Send + Sync + 'static {
    /// Schedules a reminder `after` from now, replacing any pending one.
    fn schedule_reminder(&self, after: Duration);

    /// Cancels the pending reminder, if there is one.
    fn cancel_pending_reminder(&self);
}

impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    fn schedule_reminder(&self, after: Duration) {
        (**self).schedule_reminder(after);
    }

    fn cancel_pending_reminder(&self) {
        (**self).cancel_pending_reminder();
    }
}

/// Drops every request.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopNotifier;

impl Notifier for NoopNotifier {
    fn schedule_reminder(&self, _after: Duration) {}

    fn cancel_pending_reminder(&self) {}
}

/// A reminder that came due.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reminder {
    pub title: String,
    pub body: String,
}

impl Default for Reminder {
    fn default() -> Self {
        Self {
            title: "Come back to the game!".into(),
            body: "You haven't played tic-tac-toe in a while.".into(),
        }
    }
}

/// A notifier backed by a Tokio timer.
///
/// At most one reminder is pending at a time. When it comes due it is sent
/// on the channel returned by [`TimerNotifier::new`].
///
/// Must be used from inside a Tokio runtime.
#[derive(Debug)]
pub struct TimerNotifier {
    reminder: Reminder,
    due: mpsc::UnboundedSender<Reminder>,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl TimerNotifier {
    /// Creates a notifier that sends the default [`Reminder`].
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Reminder>) {
        Self::with_reminder(Reminder::default())
    }

    /// Creates a notifier that sends `reminder`.
    pub fn with_reminder(
        reminder: Reminder,
    ) -> (Self, mpsc::UnboundedReceiver<Reminder>) {
        let (due, rx) = mpsc::unbounded_channel();
        let notifier = Self {
            reminder,
            due,
            pending: Mutex::new(None),
        };
        (notifier, rx)
    }

    /// Returns `true` if a reminder is scheduled and hasn't fired yet.
    pub fn has_pending(&self) -> bool {
        self.lock_pending()
            .as_ref()
            .is_some_and(|timer| !timer.is_finished())
    }

    fn lock_pending(&self) -> std::sync::MutexGuard<'_, Option<JoinHandle<()>>> {
        // The guarded value is only ever replaced whole, so a poisoned lock
        // still holds a usable handle.
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Notifier for TimerNotifier {
    fn schedule_reminder(&self, after: Duration) {
        let reminder = self.reminder.clone();
        let due = self.due.clone();
        let timer = tokio::spawn(async move {
            tokio::time::sleep(after).await;
            tracing::debug!("reminder due");
            let _ = due.send(reminder);
        });

        if let Some(previous) = self.lock_pending().replace(timer) {
            previous.abort();
        }
        tracing::debug!(after_secs = after.as_secs(), "reminder scheduled");
    }

    fn cancel_pending_reminder(&self) {
        if let Some(timer) = self.lock_pending().take() {
            if !timer.is_finished() {
                tracing::debug!("reminder cancelled");
            }
            timer.abort();
        }
    }
}

impl Drop for TimerNotifier {
    fn drop(&mut self) {
        self.cancel_pending_reminder();
    }
}
