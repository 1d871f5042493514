//! Who the local player is.
//!
//! Tictac doesn't sign anyone in. Accounts, passwords and tokens belong to
//! an identity provider (a hosted auth service, a local keychain, a test
//! fixture). The binder only needs two things from it: the current user id,
//! and a way to hear when that changes. That's the [`IdentityProvider`]
//! trait.
//!
//! [`StaticIdentity`] is the stand-in used by the demo client and tests:
//! whoever you tell it is signed in, is.

use tictac_protocol::UserId;
use tokio::sync::watch;

/// The boundary to whatever authenticates the local user.
///
/// # Example
///
/// ```rust
/// use tictac_protocol::UserId;
/// use tictac_session::{IdentityProvider, StaticIdentity};
///
/// let identity = StaticIdentity::signed_in(UserId::new("alice"));
/// let mut changes = identity.on_auth_change();
///
/// identity.sign_out();
/// assert!(changes.has_changed().unwrap());
/// assert_eq!(identity.current_user_id(), None);
/// ```
pub trait IdentityProvider: Send + Sync + 'static {
    /// The signed-in user, or `None` when signed out.
    fn current_user_id(&self) -> Option<UserId>;

    /// A receiver that is marked changed on every sign-in or sign-out.
    /// The value is the user after the change.
    fn on_auth_change(&self) -> watch::Receiver<Option<UserId>>;
}

/// An identity provider whose user is set by hand.
#[derive(Debug)]
pub struct StaticIdentity {
    user: watch::Sender<Option<UserId>>,
}

impl StaticIdentity {
    /// Starts with nobody signed in.
    pub fn signed_out() -> Self {
        Self {
            user: watch::Sender::new(None),
        }
    }

    /// Starts with `user` signed in.
    pub fn signed_in(user: UserId) -> Self {
        Self {
            user: watch::Sender::new(Some(user)),
        }
    }

    /// Signs `user` in, replacing whoever was signed in.
    pub fn sign_in(&self, user: UserId) {
        tracing::info!(user_id = %user, "signed in");
        self.user.send_replace(Some(user));
    }

    /// Signs the current user out.
    pub fn sign_out(&self) {
        if let Some(user) = self.user.send_replace(None) {
            tracing::info!(user_id = %user, "signed out");
        }
    }
}

impl IdentityProvider for StaticIdentity {
    fn current_user_id(&self) -> Option<UserId> {
        self.user.borrow().clone()
    }

    fn on_auth_change(&self) -> watch::Receiver<Option<UserId>> {
        self.user.subscribe()
    }
}
