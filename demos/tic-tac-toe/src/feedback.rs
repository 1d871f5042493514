//! What the player is told after an action.
//!
//! Nothing here ends the game. Store failures become a message and the
//! player decides whether to try again.

use tictac::prelude::*;

/// The line to print after a move attempt, if any.
pub fn after_move(result: &Result<MoveAttempt, BinderError>) -> Option<String> {
    match result {
        Ok(MoveAttempt::Submitted) => None,
        Ok(MoveAttempt::Ignored(IgnoreReason::NotYourTurn)) => Some("Not your turn.".into()),
        Ok(MoveAttempt::Ignored(IgnoreReason::Rejected(rejected))) => {
            Some(format!("{rejected}."))
        }
        Ok(MoveAttempt::Ignored(reason)) => Some(format!("Can't move yet ({reason:?}).")),
        Err(_) => Some("Your move didn't go through. Try again.".into()),
    }
}

/// The line to print when joining `code` failed.
///
/// Rejections get their short explanation; anything else is transient.
pub fn join_failed(code: &SessionId, err: &BinderError) -> String {
    match err.join_rejection() {
        Some(rejection) => format!("Can't join {code}: {rejection}."),
        None => format!("Can't join {code} right now. Try again."),
    }
}
