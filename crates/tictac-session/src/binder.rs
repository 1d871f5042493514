//! The session binder: one client's view of one shared game.
//!
//! The binder owns the local player's side of a game. It creates or joins
//! the shared session document, consumes the snapshots the store pushes,
//! and turns user intents (move, reset, leave) into store writes once the
//! board rules allow them.
//!
//! # State machine
//!
//! ```text
//!            host() / join()
//! [Unbound] ─────────────────→ [WaitingForOpponent]
//!     ▲                               │ guest seated
//!     │                               ▼
//!     │ leave()                  [InProgress] ◀──────┐
//!     │ (from any bound state)        │ win / draw   │ reset
//!     │                               ▼              │
//!     └────────────────────────  [Finished] ─────────┘
//! ```
//!
//! # Single writer
//!
//! The published [`LocalGameView`] changes in exactly one place,
//! [`SessionBinder::apply_remote_snapshot`]. A local move is projected
//! optimistically by feeding the expected session through that same
//! function; the next snapshot from the store replaces it with whatever was
//! actually committed. A write that fails commits nothing, so no snapshot
//! would ever correct the projection: the binder feeds the last observed
//! session back through the same function before reporting the error.

use tictac_engine::{apply_move, evaluate, MoveRejected};
use tictac_protocol::{GameSession, Role, SessionId, UserId};
use tictac_store::{DocumentStore, GameStore, GameSubscription};
use tokio::sync::watch;

use crate::{BinderConfig, BinderError, IdentityProvider, Notifier};

/// How far along a bound session is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Bound, but no guest has joined yet (or no snapshot arrived yet).
    WaitingForOpponent,
    /// Both seats taken, no winner.
    InProgress,
    /// A winner or draw is recorded. Only a reset leaves this phase.
    Finished,
}

/// Whether the binder is attached to a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinderState {
    Unbound,
    Bound(Phase),
}

/// The local projection of the shared game, published to the UI.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalGameView {
    /// The bound session, `None` while unbound.
    pub session_id: Option<SessionId>,
    /// The seat the local user holds.
    pub role: Option<Role>,
    /// The last observed (or optimistically projected) session document.
    pub session: Option<GameSession>,
    /// `true` when the document says it is the local player's move.
    pub is_local_turn: bool,
    pub state: BinderState,
}

impl LocalGameView {
    /// The view of a binder that isn't in any session.
    pub fn unbound() -> Self {
        Self {
            session_id: None,
            role: None,
            session: None,
            is_local_turn: false,
            state: BinderState::Unbound,
        }
    }
}

/// Why a move attempt was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// Not in a session.
    NotBound,
    /// Bound, but the first snapshot hasn't arrived yet.
    AwaitingSnapshot,
    /// The board rules reject the move.
    Rejected(MoveRejected),
    /// It's the other player's move.
    NotYourTurn,
}

/// The result of [`SessionBinder::attempt_move`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveAttempt {
    /// The move failed a local check. Nothing was changed or sent.
    Ignored(IgnoreReason),
    /// The move was projected locally and written to the store.
    Submitted,
}

struct Binding {
    session_id: SessionId,
    role: Role,
    subscription: GameSubscription,
}

/// Binds the local user to one shared game session at a time.
///
/// Generic over the [`DocumentStore`] behind the [`GameStore`] and over
/// the [`Notifier`]. Owned by a single task: every method takes
/// `&mut self`, and the UI observes state through [`watch_view`].
///
/// [`watch_view`]: SessionBinder::watch_view
pub struct SessionBinder<S, N> {
    store: GameStore<S>,
    notifier: N,
    user_id: UserId,
    config: BinderConfig,
    binding: Option<Binding>,
    view: watch::Sender<LocalGameView>,
}

impl<S: DocumentStore, N: Notifier> SessionBinder<S, N> {
    /// Creates an unbound binder for `user_id`.
    pub fn new(
        store: GameStore<S>,
        notifier: N,
        user_id: UserId,
        config: BinderConfig,
    ) -> Self {
        Self {
            store,
            notifier,
            user_id,
            config,
            binding: None,
            view: watch::Sender::new(LocalGameView::unbound()),
        }
    }

    /// Creates an unbound binder for whoever `identity` says is signed in.
    ///
    /// # Errors
    /// Returns [`BinderError::NotSignedIn`] if nobody is.
    pub fn signed_in(
        identity: &impl IdentityProvider,
        store: GameStore<S>,
        notifier: N,
        config: BinderConfig,
    ) -> Result<Self, BinderError> {
        let user_id = identity
            .current_user_id()
            .ok_or(BinderError::NotSignedIn)?;
        Ok(Self::new(store, notifier, user_id, config))
    }

    /// The local user.
    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    /// The bound session, if any.
    pub fn session_id(&self) -> Option<&SessionId> {
        self.binding.as_ref().map(|b| &b.session_id)
    }

    /// The current binder state.
    pub fn state(&self) -> BinderState {
        self.view.borrow().state
    }

    /// A snapshot of the current view.
    pub fn view(&self) -> LocalGameView {
        self.view.borrow().clone()
    }

    /// A receiver that sees every change to the view.
    pub fn watch_view(&self) -> watch::Receiver<LocalGameView> {
        self.view.subscribe()
    }

    // -----------------------------------------------------------------
    // Binding
    // -----------------------------------------------------------------

    /// Creates a new session hosted by the local user and binds to it.
    ///
    /// Returns the session id, which is the invite code to share.
    pub async fn host(&mut self) -> Result<SessionId, BinderError> {
        self.ensure_unbound()?;
        let session_id = self.store.create_session(&self.user_id).await?;
        let subscription = self.store.subscribe(&session_id).await?;
        self.bind(session_id.clone(), Role::Host, subscription);
        Ok(session_id)
    }

    /// Joins the session behind `code` as the guest and binds to it.
    ///
    /// Join rejections come back as [`BinderError::Store`]; see
    /// [`BinderError::join_rejection`].
    pub async fn join(&mut self, code: &SessionId) -> Result<(), BinderError> {
        self.ensure_unbound()?;
        self.store.join_session(code, &self.user_id).await?;
        let subscription = self.store.subscribe(code).await?;
        self.bind(code.clone(), Role::Guest, subscription);
        Ok(())
    }

    fn ensure_unbound(&self) -> Result<(), BinderError> {
        match &self.binding {
            Some(binding) => {
                Err(BinderError::AlreadyBound(binding.session_id.clone()))
            }
            None => Ok(()),
        }
    }

    fn bind(
        &mut self,
        session_id: SessionId,
        role: Role,
        subscription: GameSubscription,
    ) {
        tracing::info!(%session_id, user_id = %self.user_id, %role, "bound to session");
        self.view.send_replace(LocalGameView {
            session_id: Some(session_id.clone()),
            role: Some(role),
            session: None,
            is_local_turn: false,
            state: BinderState::Bound(Phase::WaitingForOpponent),
        });
        self.binding = Some(Binding {
            session_id,
            role,
            subscription,
        });
    }

    // -----------------------------------------------------------------
    // Snapshots
    // -----------------------------------------------------------------

    /// Waits for the next snapshot and applies it.
    ///
    /// Returns the updated view, or `None` when unbound or when the
    /// subscription has ended. Cancel-safe: dropping the future loses no
    /// snapshot.
    pub async fn next_snapshot(&mut self) -> Option<LocalGameView> {
        let binding = self.binding.as_mut()?;
        let Some(session) = binding.subscription.next().await else {
            tracing::warn!(session_id = %binding.session_id, "session subscription ended");
            return None;
        };
        self.apply_remote_snapshot(session);
        Some(self.view())
    }

    /// Replaces the projected view with `session`.
    ///
    /// This is the only place the view of a bound binder changes. Ignored
    /// while unbound.
    pub fn apply_remote_snapshot(&mut self, session: GameSession) {
        let Some(binding) = &self.binding else {
            tracing::debug!("snapshot while unbound, ignoring");
            return;
        };

        let role = binding.role;
        let is_local_turn = role.mark() == session.current_player;
        let phase = if session.winner.is_some() {
            Phase::Finished
        } else if !session.has_guest() {
            Phase::WaitingForOpponent
        } else {
            Phase::InProgress
        };

        let previous = self.view.borrow().state;
        if previous != BinderState::Bound(phase) {
            tracing::info!(
                session_id = %binding.session_id,
                ?phase,
                "session phase changed"
            );
        }

        self.view.send_replace(LocalGameView {
            session_id: Some(binding.session_id.clone()),
            role: Some(role),
            session: Some(session),
            is_local_turn,
            state: BinderState::Bound(phase),
        });
    }

    // -----------------------------------------------------------------
    // Intents
    // -----------------------------------------------------------------

    /// Plays the local mark at `index` if the rules allow it.
    ///
    /// A move that fails a check is [`MoveAttempt::Ignored`] and changes
    /// nothing. A valid move cancels any pending reminder, is projected
    /// into the view at once, and is then written to the store.
    ///
    /// # Errors
    /// Returns [`BinderError::Store`] if the write fails. The projection is
    /// rolled back to the last observed document first, so the binder is
    /// left exactly as before the attempt and the same move can be retried.
    pub async fn attempt_move(
        &mut self,
        index: usize,
    ) -> Result<MoveAttempt, BinderError> {
        let Some(binding) = &self.binding else {
            return Ok(MoveAttempt::Ignored(IgnoreReason::NotBound));
        };
        let Some(session) = self.view.borrow().session.clone() else {
            return Ok(MoveAttempt::Ignored(IgnoreReason::AwaitingSnapshot));
        };
        let session_id = binding.session_id.clone();
        let mark = binding.role.mark();

        if session.is_finished() {
            return Ok(MoveAttempt::Ignored(IgnoreReason::Rejected(
                MoveRejected::GameOver,
            )));
        }
        let board = match apply_move(&session.board, mark, index) {
            Ok(board) => board,
            Err(rejected) => {
                return Ok(MoveAttempt::Ignored(IgnoreReason::Rejected(rejected)));
            }
        };
        if session.current_player != mark {
            return Ok(MoveAttempt::Ignored(IgnoreReason::NotYourTurn));
        }

        self.notifier.cancel_pending_reminder();

        let outcome = evaluate(&board);
        let mut projected = session.clone();
        projected.board = board;
        projected.current_player = mark.opponent();
        projected.record_outcome(outcome);
        self.apply_remote_snapshot(projected);

        tracing::debug!(%session_id, index, %mark, "submitting move");
        let submitted = self
            .store
            .submit_move(&session_id, index, mark, &board, outcome)
            .await;
        if let Err(e) = submitted {
            // Nothing was committed, so no snapshot will replace the
            // projection. Put the last observed document back.
            tracing::warn!(%session_id, index, error = %e, "move not written, view restored");
            self.apply_remote_snapshot(session);
            return Err(e.into());
        }
        Ok(MoveAttempt::Submitted)
    }

    /// Starts a new round in the bound session. Either player may reset at
    /// any time. While unbound this only clears the local view.
    ///
    /// Nothing is projected: the view changes when the reset's snapshot
    /// arrives. A failed write therefore leaves the view untouched.
    pub async fn attempt_reset(&mut self) -> Result<(), BinderError> {
        match &self.binding {
            Some(binding) => {
                let session_id = binding.session_id.clone();
                self.store.reset_session(&session_id).await?;
            }
            None => {
                self.view.send_replace(LocalGameView::unbound());
            }
        }
        Ok(())
    }

    /// Leaves the bound session.
    ///
    /// The subscription is cancelled before the binder becomes unbound, so
    /// no snapshot from the old session is applied afterwards. The session
    /// document is left in place. Does nothing while unbound.
    pub fn leave(&mut self) {
        let Some(binding) = self.binding.take() else {
            return;
        };
        self.store.leave(binding.subscription);
        self.view.send_replace(LocalGameView::unbound());
    }

    /// Reacts to a sign-in or sign-out.
    ///
    /// If the signed-in user is no longer the local user, the bound session
    /// is left. A different user becomes the new local user.
    pub fn handle_auth_change(&mut self, user: Option<UserId>) {
        if user.as_ref() == Some(&self.user_id) {
            return;
        }
        if self.binding.is_some() {
            tracing::info!(user_id = %self.user_id, "auth changed, leaving session");
            self.leave();
        }
        if let Some(user) = user {
            self.user_id = user;
        }
    }

    // -----------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------

    /// The client went to the background: schedule a reminder.
    pub fn suspend(&self) {
        self.notifier.schedule_reminder(self.config.reminder_after);
    }

    /// The client came back: cancel the reminder.
    pub fn resume(&self) {
        self.notifier.cancel_pending_reminder();
    }
}
