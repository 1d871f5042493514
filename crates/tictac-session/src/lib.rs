//! The client side of a shared Tictac game.
//!
//! This crate connects one local player to one game session:
//!
//! 1. **Identity**: who the local player is ([`IdentityProvider`] trait)
//! 2. **Binding**: hosting or joining a session and following it
//!    ([`SessionBinder`], [`LocalGameView`])
//! 3. **Reminders**: nudging a player who wandered off ([`Notifier`] trait)
//!
//! # How it fits in the stack
//!
//! ```text
//! UI / demo client (above)  ← reads LocalGameView, calls attempt_move etc.
//!     ↕
//! Session Layer (this crate)  ← one binder per client
//!     ↕
//! Store Layer (below)  ← GameStore over any DocumentStore
//! ```

mod binder;
mod config;
mod error;
mod identity;
mod notifier;

pub use binder::{
    BinderState, IgnoreReason, LocalGameView, MoveAttempt, Phase, SessionBinder,
};
pub use config::BinderConfig;
pub use error::BinderError;
pub use identity::{IdentityProvider, StaticIdentity};
pub use notifier::{NoopNotifier, Notifier, Reminder, TimerNotifier};
