//! The shared game document.
//!
//! One `GameSession` document exists per game. Both clients subscribe to it
//! and write to it; neither ever talks to the other directly. The JSON
//! field names below (`hostId`, `currentPlayer`, ...) are the wire contract
//! and must not change.
//!
//! A game X has just won:
//!
//! ```json
//! {
//!   "hostId": "alice",
//!   "guestId": "bob",
//!   "board": ["X", "O", "", "", "X", "O", "", "", "X"],
//!   "currentPlayer": "O",
//!   "winner": "X",
//!   "winningLine": [0, 4, 8],
//!   "createdAt": 1700000000000
//! }
//! ```
//!
//! Reading is lenient, writing is strict. Documents from older clients use
//! `""` where a field is unset and `"none"` for both empty cells and draws;
//! those still decode. Everything written here uses the current shape:
//! `winner` and `winningLine` are omitted while the game is running.

use std::fmt;

use serde::de::IntoDeserializer;
use serde::{Deserialize, Deserializer, Serialize};
use tictac_engine::{evaluate, Board, Mark, Outcome, WinningLine};

use crate::{Document, ProtocolError, UserId};

/// The collection game documents live in.
pub const GAMES_COLLECTION: &str = "games";

/// Field paths of the game document, for building field updates.
pub mod fields {
    pub const HOST_ID: &str = "hostId";
    pub const GUEST_ID: &str = "guestId";
    pub const BOARD: &str = "board";
    pub const CURRENT_PLAYER: &str = "currentPlayer";
    pub const WINNER: &str = "winner";
    pub const WINNING_LINE: &str = "winningLine";
    pub const CREATED_AT: &str = "createdAt";
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Which seat a participant holds. The host plays X, the guest plays O.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Role {
    Host,
    Guest,
}

impl Role {
    /// The mark this role plays.
    pub fn mark(self) -> Mark {
        match self {
            Self::Host => Mark::X,
            Self::Guest => Mark::O,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host => write!(f, "host"),
            Self::Guest => write!(f, "guest"),
        }
    }
}

// ---------------------------------------------------------------------------
// Winner
// ---------------------------------------------------------------------------

/// The result of a finished game as stored in the document.
///
/// Serialized as `"X"`, `"O"` or `"Draw"`. Documents written by older
/// clients use `"none"` for a draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Winner {
    X,
    O,
    #[serde(alias = "none")]
    Draw,
}

impl Winner {
    /// The winning mark, or `None` for a draw.
    pub fn mark(self) -> Option<Mark> {
        match self {
            Self::X => Some(Mark::X),
            Self::O => Some(Mark::O),
            Self::Draw => None,
        }
    }
}

impl From<Mark> for Winner {
    fn from(mark: Mark) -> Self {
        match mark {
            Mark::X => Self::X,
            Mark::O => Self::O,
        }
    }
}

impl fmt::Display for Winner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::X => write!(f, "X"),
            Self::O => write!(f, "O"),
            Self::Draw => write!(f, "Draw"),
        }
    }
}

// ---------------------------------------------------------------------------
// GameSession
// ---------------------------------------------------------------------------

/// The shared game document.
///
/// `winner` is absent while the game is ongoing. Once present the session
/// is terminal until it is reset. `winning_line` is present exactly when
/// `winner` is X or O.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameSession {
    pub host_id: UserId,

    /// Empty on the wire (`""`) until a guest joins.
    #[serde(default, with = "empty_user")]
    pub guest_id: Option<UserId>,

    pub board: Board,

    pub current_player: Mark,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_winner"
    )]
    pub winner: Option<Winner>,

    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "deserialize_winning_line"
    )]
    pub winning_line: Option<WinningLine>,

    /// Milliseconds since the Unix epoch.
    #[serde(default)]
    pub created_at: u64,
}

impl GameSession {
    /// A fresh session: empty board, X to move, no guest, no winner.
    pub fn new(host_id: UserId, created_at: u64) -> Self {
        Self {
            host_id,
            guest_id: None,
            board: Board::empty(),
            current_player: Mark::X,
            winner: None,
            winning_line: None,
            created_at,
        }
    }

    /// Returns the role `user` holds in this session, if any.
    pub fn role_of(&self, user: &UserId) -> Option<Role> {
        if &self.host_id == user {
            Some(Role::Host)
        } else if self.guest_id.as_ref() == Some(user) {
            Some(Role::Guest)
        } else {
            None
        }
    }

    /// Returns `true` once a guest has taken the second seat.
    pub fn has_guest(&self) -> bool {
        self.guest_id.is_some()
    }

    /// Returns `true` once a winner (or draw) has been recorded.
    pub fn is_finished(&self) -> bool {
        self.winner.is_some()
    }

    /// Recomputes the outcome from the board alone.
    ///
    /// The stored `winner` is what clients agreed on; this is what the rules
    /// say. They differ only if a writer broke the protocol.
    pub fn board_outcome(&self) -> Outcome {
        evaluate(&self.board)
    }

    /// Records `outcome` in `winner` / `winning_line`. `Ongoing` clears both.
    pub fn record_outcome(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Ongoing => {
                self.winner = None;
                self.winning_line = None;
            }
            Outcome::Win { mark, line } => {
                self.winner = Some(Winner::from(mark));
                self.winning_line = Some(line);
            }
            Outcome::Draw => {
                self.winner = Some(Winner::Draw);
                self.winning_line = None;
            }
        }
    }

    /// Converts the session into a store document.
    ///
    /// # Errors
    /// Returns `ProtocolError::Encode` if serialization fails.
    pub fn to_document(&self) -> Result<Document, ProtocolError> {
        match serde_json::to_value(self).map_err(ProtocolError::Encode)? {
            serde_json::Value::Object(map) => Ok(map),
            _ => Err(ProtocolError::InvalidMessage(
                "game session did not serialize to an object".into(),
            )),
        }
    }

    /// Reads a session out of a store document.
    ///
    /// # Errors
    /// Returns `ProtocolError::Decode` if a field is missing or malformed.
    pub fn from_document(doc: &Document) -> Result<Self, ProtocolError> {
        serde_json::from_value(serde_json::Value::Object(doc.clone()))
            .map_err(ProtocolError::Decode)
    }
}

// ---------------------------------------------------------------------------
// Lenient field codecs
// ---------------------------------------------------------------------------

/// `guestId` is an empty string rather than a missing field when there is
/// no guest.
mod empty_user {
    use serde::{Deserialize, Deserializer, Serializer};

    use crate::UserId;

    pub fn serialize<S: Serializer>(
        value: &Option<UserId>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(value.as_ref().map_or("", UserId::as_str))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<UserId>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.filter(|s| !s.is_empty()).map(UserId::new))
    }
}

/// Older documents store `""` for "no winner yet".
fn deserialize_winner<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<Winner>, D::Error> {
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some(s) => Winner::deserialize(s.into_deserializer()).map(Some),
    }
}

/// Reset used to write an empty array; treat it like a missing line.
fn deserialize_winning_line<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<WinningLine>, D::Error> {
    let raw = Option::<Vec<usize>>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(v) if v.is_empty() => Ok(None),
        Some(v) => <WinningLine>::try_from(v.as_slice())
            .map(Some)
            .map_err(|_| {
                serde::de::Error::invalid_length(
                    v.len(),
                    &"a winning line of 3 indices",
                )
            }),
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tictac_engine::{apply_move, Cell};

    fn alice() -> UserId {
        UserId::new("alice")
    }

    fn bob() -> UserId {
        UserId::new("bob")
    }

    #[test]
    fn test_new_session_json_uses_wire_field_names() {
        let session = GameSession::new(alice(), 1_700_000_000_000);
        let json = serde_json::to_value(&session).unwrap();

        assert_eq!(
            json,
            json!({
                "hostId": "alice",
                "guestId": "",
                "board": ["", "", "", "", "", "", "", "", ""],
                "currentPlayer": "X",
                "createdAt": 1_700_000_000_000u64,
            })
        );
    }

    #[test]
    fn test_finished_session_writes_winner_and_line() {
        let mut session = GameSession::new(alice(), 0);
        session.record_outcome(Outcome::Win { mark: Mark::O, line: [2, 4, 6] });
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["winner"], "O");
        assert_eq!(json["winningLine"], json!([2, 4, 6]));
    }

    #[test]
    fn test_draw_has_no_winning_line() {
        let mut session = GameSession::new(alice(), 0);
        session.record_outcome(Outcome::Draw);
        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["winner"], "Draw");
        assert!(json.get("winningLine").is_none());
    }

    #[test]
    fn test_legacy_document_decodes() {
        // Shape written by the first generation of clients: empty strings
        // instead of missing fields, "none" for empty cells and draws.
        let doc = json!({
            "hostId": "alice",
            "guestId": "bob",
            "board": ["X", "none", "", "", "", "", "", "", ""],
            "currentPlayer": "O",
            "winner": "",
            "winningLine": [],
        });
        let session: GameSession = serde_json::from_value(doc).unwrap();

        assert_eq!(session.guest_id, Some(bob()));
        assert_eq!(session.board.get(0), Some(Cell::X));
        assert_eq!(session.board.get(1), Some(Cell::Empty));
        assert_eq!(session.winner, None);
        assert_eq!(session.winning_line, None);
        assert_eq!(session.created_at, 0);
    }

    #[test]
    fn test_legacy_none_winner_is_draw() {
        let doc = json!({
            "hostId": "alice",
            "guestId": "",
            "board": ["", "", "", "", "", "", "", "", ""],
            "currentPlayer": "X",
            "winner": "none",
        });
        let session: GameSession = serde_json::from_value(doc).unwrap();
        assert_eq!(session.winner, Some(Winner::Draw));
        assert_eq!(session.guest_id, None);
    }

    #[test]
    fn test_bad_winning_line_length_rejected() {
        let doc = json!({
            "hostId": "alice",
            "board": ["", "", "", "", "", "", "", "", ""],
            "currentPlayer": "X",
            "winner": "X",
            "winningLine": [0, 1],
        });
        assert!(serde_json::from_value::<GameSession>(doc).is_err());
    }

    #[test]
    fn test_unknown_winner_rejected() {
        let doc = json!({
            "hostId": "alice",
            "board": ["", "", "", "", "", "", "", "", ""],
            "currentPlayer": "X",
            "winner": "Z",
        });
        assert!(serde_json::from_value::<GameSession>(doc).is_err());
    }

    #[test]
    fn test_document_conversion_preserves_session() {
        let mut session = GameSession::new(alice(), 42);
        session.guest_id = Some(bob());
        session.board = apply_move(&session.board, Mark::X, 4).unwrap();
        session.current_player = Mark::O;

        let doc = session.to_document().unwrap();
        assert_eq!(doc["currentPlayer"], "O");
        assert_eq!(GameSession::from_document(&doc).unwrap(), session);
    }

    #[test]
    fn test_from_document_missing_board_is_decode_error() {
        let mut doc = Document::new();
        doc.insert("hostId".into(), json!("alice"));
        let result = GameSession::from_document(&doc);
        assert!(matches!(result, Err(ProtocolError::Decode(_))));
    }

    #[test]
    fn test_role_of() {
        let mut session = GameSession::new(alice(), 0);
        assert_eq!(session.role_of(&alice()), Some(Role::Host));
        assert_eq!(session.role_of(&bob()), None);
        session.guest_id = Some(bob());
        assert_eq!(session.role_of(&bob()), Some(Role::Guest));
    }

    #[test]
    fn test_role_mark() {
        assert_eq!(Role::Host.mark(), Mark::X);
        assert_eq!(Role::Guest.mark(), Mark::O);
    }

    #[test]
    fn test_record_outcome_ongoing_clears() {
        let mut session = GameSession::new(alice(), 0);
        session.record_outcome(Outcome::Win { mark: Mark::X, line: [0, 1, 2] });
        session.record_outcome(Outcome::Ongoing);
        assert!(!session.is_finished());
        assert_eq!(session.winning_line, None);
    }
}
