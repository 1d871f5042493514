//! The game session adapter: game operations in terms of document writes.

use std::time::{SystemTime, UNIX_EPOCH};

use serde_json::Value;
use tictac_engine::{Board, Mark, Outcome};
use tictac_protocol::{
    fields, Document, FieldUpdate, GameSession, ProtocolError, SessionId,
    UserId, Winner, GAMES_COLLECTION,
};

use crate::{
    DocumentStore, GameStoreError, JoinRejection, StoreError, Subscription,
};

/// Milliseconds since the Unix epoch, for `createdAt`.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

/// Reads and writes game sessions in a [`DocumentStore`].
///
/// `GameStore` holds no game state of its own. Every method is a thin
/// translation into one or two store calls, and whatever the store commits
/// last is the truth.
///
/// Cloning is as cheap as cloning the backend.
#[derive(Clone)]
pub struct GameStore<S> {
    backend: S,
    collection: String,
}

impl<S: DocumentStore> GameStore<S> {
    /// Stores sessions in the default `games` collection.
    pub fn new(backend: S) -> Self {
        Self::with_collection(backend, GAMES_COLLECTION)
    }

    /// Stores sessions in `collection`.
    pub fn with_collection(backend: S, collection: impl Into<String>) -> Self {
        Self {
            backend,
            collection: collection.into(),
        }
    }

    /// The underlying document store.
    pub fn backend(&self) -> &S {
        &self.backend
    }

    /// Creates a fresh session hosted by `host_id` and returns its id,
    /// which doubles as the invite code.
    pub async fn create_session(
        &self,
        host_id: &UserId,
    ) -> Result<SessionId, GameStoreError> {
        let session = GameSession::new(host_id.clone(), now_millis());
        let id = self
            .backend
            .create(&self.collection, session.to_document()?)
            .await?;
        tracing::info!(session_id = %id, %host_id, "session created");
        Ok(id)
    }

    /// Reads a session once. `Ok(None)` if there is no such session.
    pub async fn fetch_session(
        &self,
        session_id: &SessionId,
    ) -> Result<Option<GameSession>, GameStoreError> {
        let Some(doc) = self.backend.get(&self.collection, session_id).await?
        else {
            return Ok(None);
        };
        Ok(Some(GameSession::from_document(&doc)?))
    }

    /// Takes the guest seat of `session_id` for `guest_id`.
    ///
    /// Rejected with [`JoinRejection::NotFound`] if the session doesn't
    /// exist, [`JoinRejection::SelfJoin`] if `guest_id` is the host, and
    /// [`JoinRejection::SlotTaken`] if a guest is already seated, in that
    /// order.
    ///
    /// The check and the write are separate store calls. Two guests racing
    /// for the same seat can both pass the check; the later write wins.
    pub async fn join_session(
        &self,
        session_id: &SessionId,
        guest_id: &UserId,
    ) -> Result<(), GameStoreError> {
        let session = self
            .fetch_session(session_id)
            .await?
            .ok_or(JoinRejection::NotFound)?;
        if &session.host_id == guest_id {
            return Err(JoinRejection::SelfJoin.into());
        }
        if session.has_guest() {
            return Err(JoinRejection::SlotTaken.into());
        }

        let update = vec![FieldUpdate::set(fields::GUEST_ID, guest_id.as_str())];
        self.backend
            .update(&self.collection, session_id, update)
            .await
            .map_err(|err| match err {
                // Deleted between the read and the write.
                StoreError::NotFound { .. } => {
                    GameStoreError::Join(JoinRejection::NotFound)
                }
                other => other.into(),
            })?;
        tracing::info!(%session_id, %guest_id, "session joined");
        Ok(())
    }

    /// Watches a session. The current state arrives first.
    pub async fn subscribe(
        &self,
        session_id: &SessionId,
    ) -> Result<GameSubscription, GameStoreError> {
        let inner = self.backend.subscribe(&self.collection, session_id).await?;
        Ok(GameSubscription { inner })
    }

    /// Records a move.
    ///
    /// `board` is the board after `mark` was placed at `index` and
    /// `outcome` its evaluation; both come from the engine. The whole board
    /// is written along with the next player and, for a finished game, the
    /// winner. No check is made against what is stored.
    ///
    /// Everything goes out as a single `update`, so watchers never see a
    /// board with the new mark but the old `currentPlayer`. The same call
    /// makes failure all-or-nothing: on `Err` the stored session is exactly
    /// what it was, and retrying the same move is safe.
    ///
    /// ```text
    /// X wins at 8:   board        ← full board
    ///                currentPlayer ← "O"
    ///                winner       ← "X"
    ///                winningLine  ← [0, 4, 8]
    /// ```
    pub async fn submit_move(
        &self,
        session_id: &SessionId,
        index: usize,
        mark: Mark,
        board: &Board,
        outcome: Outcome,
    ) -> Result<(), GameStoreError> {
        let board_value =
            serde_json::to_value(board).map_err(ProtocolError::Encode)?;
        let mut updates = vec![
            FieldUpdate::set(fields::BOARD, board_value),
            FieldUpdate::set(
                fields::CURRENT_PLAYER,
                mark.opponent().to_string(),
            ),
        ];
        match outcome {
            Outcome::Ongoing => {}
            Outcome::Win { mark: winner, line } => {
                updates.push(FieldUpdate::set(
                    fields::WINNER,
                    Winner::from(winner).to_string(),
                ));
                updates.push(FieldUpdate::set(
                    fields::WINNING_LINE,
                    Value::from(line.to_vec()),
                ));
            }
            Outcome::Draw => {
                updates.push(FieldUpdate::set(
                    fields::WINNER,
                    Winner::Draw.to_string(),
                ));
                updates.push(FieldUpdate::delete(fields::WINNING_LINE));
            }
        }

        self.backend
            .update(&self.collection, session_id, updates)
            .await?;
        tracing::debug!(%session_id, index, %mark, ?outcome, "move submitted");
        Ok(())
    }

    /// Clears the board for a new round: all cells empty, X to move, no
    /// winner. Players stay seated.
    pub async fn reset_session(
        &self,
        session_id: &SessionId,
    ) -> Result<(), GameStoreError> {
        let board_value = serde_json::to_value(Board::empty())
            .map_err(ProtocolError::Encode)?;
        let updates = vec![
            FieldUpdate::set(fields::BOARD, board_value),
            FieldUpdate::set(fields::CURRENT_PLAYER, Mark::X.to_string()),
            FieldUpdate::delete(fields::WINNER),
            FieldUpdate::delete(fields::WINNING_LINE),
        ];
        self.backend
            .update(&self.collection, session_id, updates)
            .await?;
        tracing::info!(%session_id, "session reset");
        Ok(())
    }

    /// Stops watching a session. The document itself is left alone; the
    /// other player may still be in it.
    pub fn leave(&self, subscription: GameSubscription) {
        let session_id = subscription.session_id().clone();
        subscription.cancel();
        tracing::info!(%session_id, "session left");
    }
}

/// A live watch on one game session.
///
/// Like [`Subscription`], cancelling or dropping it stops delivery at once.
#[derive(Debug)]
pub struct GameSubscription {
    inner: Subscription,
}

impl GameSubscription {
    /// The watched session.
    pub fn session_id(&self) -> &SessionId {
        self.inner.document_id()
    }

    /// Waits for the next decodable snapshot.
    ///
    /// Snapshots that don't decode as a `GameSession` are logged and
    /// skipped. `None` once the subscription has ended.
    pub async fn next(&mut self) -> Option<GameSession> {
        loop {
            let snapshot = self.inner.next().await?;
            if let Some(session) = decode(&snapshot.data, self.session_id()) {
                return Some(session);
            }
        }
    }

    /// Returns the next decodable snapshot if one is already queued.
    pub fn try_next(&mut self) -> Option<GameSession> {
        loop {
            let snapshot = self.inner.try_next()?;
            if let Some(session) = decode(&snapshot.data, self.session_id()) {
                return Some(session);
            }
        }
    }

    /// Stops delivery and releases the watch.
    pub fn cancel(self) {
        self.inner.cancel();
    }
}

fn decode(
    doc: &Document,
    session_id: &SessionId,
) -> Option<GameSession> {
    match GameSession::from_document(doc) {
        Ok(session) => Some(session),
        Err(error) => {
            tracing::warn!(%session_id, %error, "skipping malformed snapshot");
            None
        }
    }
}
