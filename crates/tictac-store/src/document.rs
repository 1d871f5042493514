//! Field-path updates and document id generation.

use rand::distr::Alphanumeric;
use rand::Rng;
use serde_json::Value;
use tictac_protocol::{Document, DocumentId, FieldUpdate, FieldValue};

use crate::StoreError;

/// Applies `updates` to `doc`, all or nothing.
///
/// Updates run in order against a scratch copy; `doc` is only replaced if
/// every one of them succeeds.
///
/// # Errors
/// Returns [`StoreError::InvalidPath`] if a path is empty, has an empty
/// segment, indexes past the end of an array, descends into a scalar, or
/// tries to delete an array element.
pub fn apply_updates(
    doc: &mut Document,
    updates: &[FieldUpdate],
) -> Result<(), StoreError> {
    let mut scratch = doc.clone();
    for update in updates {
        let segments = split_path(&update.path)?;
        match &update.value {
            FieldValue::Set(value) => {
                set_in_map(&mut scratch, &segments, value.clone(), &update.path)?
            }
            FieldValue::Delete => {
                delete_in_map(&mut scratch, &segments, &update.path)?
            }
        }
    }
    *doc = scratch;
    Ok(())
}

/// Generates a random alphanumeric document id of `len` characters.
pub fn generate_id(len: usize) -> DocumentId {
    let id: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect();
    DocumentId::new(id)
}

fn invalid(path: &str, reason: &str) -> StoreError {
    StoreError::InvalidPath {
        path: path.to_string(),
        reason: reason.to_string(),
    }
}

fn split_path(path: &str) -> Result<Vec<&str>, StoreError> {
    let segments: Vec<&str> = path.split('.').collect();
    if segments.iter().any(|s| s.is_empty()) {
        return Err(invalid(path, "empty path segment"));
    }
    Ok(segments)
}

fn parse_index(
    segment: &str,
    len: usize,
    path: &str,
) -> Result<usize, StoreError> {
    let index: usize = segment
        .parse()
        .map_err(|_| invalid(path, "array segment is not an index"))?;
    if index >= len {
        return Err(invalid(path, "array index out of range"));
    }
    Ok(index)
}

fn set_in_map(
    map: &mut Document,
    segments: &[&str],
    value: Value,
    path: &str,
) -> Result<(), StoreError> {
    let Some((first, rest)) = segments.split_first() else {
        return Err(invalid(path, "empty path"));
    };
    if rest.is_empty() {
        map.insert((*first).to_string(), value);
        return Ok(());
    }
    let child = map
        .entry((*first).to_string())
        .or_insert_with(|| Value::Object(Document::new()));
    set_in_value(child, rest, value, path)
}

fn set_in_value(
    target: &mut Value,
    segments: &[&str],
    value: Value,
    path: &str,
) -> Result<(), StoreError> {
    match target {
        Value::Object(map) => set_in_map(map, segments, value, path),
        Value::Array(items) => {
            let Some((first, rest)) = segments.split_first() else {
                return Err(invalid(path, "empty path"));
            };
            let index = parse_index(first, items.len(), path)?;
            if rest.is_empty() {
                items[index] = value;
                Ok(())
            } else {
                set_in_value(&mut items[index], rest, value, path)
            }
        }
        _ => Err(invalid(path, "cannot descend into a scalar")),
    }
}

fn delete_in_map(
    map: &mut Document,
    segments: &[&str],
    path: &str,
) -> Result<(), StoreError> {
    let Some((first, rest)) = segments.split_first() else {
        return Err(invalid(path, "empty path"));
    };
    if rest.is_empty() {
        map.remove(*first);
        return Ok(());
    }
    match map.get_mut(*first) {
        Some(child) => delete_in_value(child, rest, path),
        None => Ok(()),
    }
}

fn delete_in_value(
    target: &mut Value,
    segments: &[&str],
    path: &str,
) -> Result<(), StoreError> {
    match target {
        Value::Object(map) => delete_in_map(map, segments, path),
        Value::Array(items) => {
            let Some((first, rest)) = segments.split_first() else {
                return Err(invalid(path, "empty path"));
            };
            if rest.is_empty() {
                return Err(invalid(path, "array elements cannot be deleted"));
            }
            let index = parse_index(first, items.len(), path)?;
            delete_in_value(&mut items[index], rest, path)
        }
        // Nothing below a scalar, so nothing to delete.
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => panic!("test document must be an object"),
        }
    }

    #[test]
    fn test_apply_updates_sets_top_level_field() {
        let mut d = doc(json!({ "currentPlayer": "X" }));
        apply_updates(&mut d, &[FieldUpdate::set("currentPlayer", "O")]).unwrap();
        assert_eq!(d["currentPlayer"], "O");
    }

    #[test]
    fn test_apply_updates_sets_array_element_by_index() {
        let mut d = doc(json!({ "board": ["", "", ""] }));
        apply_updates(&mut d, &[FieldUpdate::set("board.1", "X")]).unwrap();
        assert_eq!(d["board"], json!(["", "X", ""]));
    }

    #[test]
    fn test_apply_updates_creates_intermediate_objects() {
        let mut d = Document::new();
        apply_updates(&mut d, &[FieldUpdate::set("stats.wins.x", 1)]).unwrap();
        assert_eq!(Value::Object(d), json!({ "stats": { "wins": { "x": 1 } } }));
    }

    #[test]
    fn test_apply_updates_delete_removes_field() {
        let mut d = doc(json!({ "winner": "X", "winningLine": [0, 1, 2] }));
        apply_updates(
            &mut d,
            &[FieldUpdate::delete("winner"), FieldUpdate::delete("winningLine")],
        )
        .unwrap();
        assert!(d.is_empty());
    }

    #[test]
    fn test_apply_updates_delete_missing_is_noop() {
        let mut d = doc(json!({ "a": 1 }));
        apply_updates(&mut d, &[FieldUpdate::delete("b.c")]).unwrap();
        assert_eq!(Value::Object(d), json!({ "a": 1 }));
    }

    #[test]
    fn test_apply_updates_index_out_of_range_rejected() {
        let mut d = doc(json!({ "board": ["", ""] }));
        let err = apply_updates(&mut d, &[FieldUpdate::set("board.9", "X")])
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidPath { .. }));
    }

    #[test]
    fn test_apply_updates_is_all_or_nothing() {
        let mut d = doc(json!({ "board": ["", ""], "currentPlayer": "X" }));
        let before = d.clone();
        let result = apply_updates(
            &mut d,
            &[
                FieldUpdate::set("currentPlayer", "O"),
                FieldUpdate::set("board.5", "X"),
            ],
        );
        assert!(result.is_err());
        assert_eq!(d, before, "a failed update must not leave partial writes");
    }

    #[test]
    fn test_apply_updates_empty_segment_rejected() {
        let mut d = Document::new();
        assert!(apply_updates(&mut d, &[FieldUpdate::set("a..b", 1)]).is_err());
        assert!(apply_updates(&mut d, &[FieldUpdate::set("", 1)]).is_err());
    }

    #[test]
    fn test_apply_updates_scalar_descent_rejected() {
        let mut d = doc(json!({ "currentPlayer": "X" }));
        let result = apply_updates(&mut d, &[FieldUpdate::set("currentPlayer.x", 1)]);
        assert!(result.is_err());
    }

    #[test]
    fn test_apply_updates_array_element_delete_rejected() {
        let mut d = doc(json!({ "board": ["X"] }));
        assert!(apply_updates(&mut d, &[FieldUpdate::delete("board.0")]).is_err());
    }

    #[test]
    fn test_generate_id_length_and_charset() {
        let id = generate_id(20);
        assert_eq!(id.as_str().len(), 20);
        assert!(id.as_str().chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn test_generate_id_is_random() {
        assert_ne!(generate_id(20), generate_id(20));
    }
}
