//! Integration tests for the in-memory document store actor.

use std::time::Duration;

use serde_json::json;
use tictac_protocol::{Document, DocumentId, FieldUpdate};
use tictac_store::{DocumentStore, MemoryStore, StoreConfig, StoreError};

fn doc(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("test document must be an object"),
    }
}

fn store() -> MemoryStore {
    MemoryStore::spawn(StoreConfig::default())
}

// =========================================================================
// Create / get / update
// =========================================================================

#[tokio::test]
async fn test_create_then_get_returns_document() {
    let store = store();
    let id = store.create("games", doc(json!({ "n": 1 }))).await.unwrap();
    assert_eq!(id.as_str().len(), 20);

    let fetched = store.get("games", &id).await.unwrap();
    assert_eq!(fetched, Some(doc(json!({ "n": 1 }))));
}

#[tokio::test]
async fn test_create_uses_configured_id_length() {
    let store = MemoryStore::spawn(StoreConfig {
        id_length: 8,
        ..StoreConfig::default()
    });
    let id = store.create("games", Document::new()).await.unwrap();
    assert_eq!(id.as_str().len(), 8);
}

#[tokio::test]
async fn test_get_missing_returns_none() {
    let store = store();
    let fetched = store.get("games", &DocumentId::new("nope")).await.unwrap();
    assert_eq!(fetched, None);
}

#[tokio::test]
async fn test_collections_are_separate() {
    let store = store();
    let id = store.create("games", Document::new()).await.unwrap();
    assert_eq!(store.get("other", &id).await.unwrap(), None);
}

#[tokio::test]
async fn test_update_missing_document_not_found() {
    let store = store();
    let result = store
        .update("games", &DocumentId::new("nope"), vec![FieldUpdate::set("a", 1)])
        .await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_update_invalid_path_leaves_document_untouched() {
    let store = store();
    let id = store
        .create("games", doc(json!({ "board": ["", ""] })))
        .await
        .unwrap();
    let result = store
        .update(
            "games",
            &id,
            vec![FieldUpdate::set("turn", "O"), FieldUpdate::set("board.7", "X")],
        )
        .await;
    assert!(matches!(result, Err(StoreError::InvalidPath { .. })));
    assert_eq!(
        store.get("games", &id).await.unwrap(),
        Some(doc(json!({ "board": ["", ""] })))
    );
}

// =========================================================================
// Subscriptions
// =========================================================================

#[tokio::test]
async fn test_subscribe_delivers_current_then_commits_in_order() {
    let store = store();
    let id = store.create("games", doc(json!({ "n": 0 }))).await.unwrap();
    let mut sub = store.subscribe("games", &id).await.unwrap();

    for n in 1..=3 {
        store
            .update("games", &id, vec![FieldUpdate::set("n", n)])
            .await
            .unwrap();
    }

    for expected in 0..=3 {
        let snap = sub.next().await.unwrap();
        assert_eq!(snap.id, id);
        assert_eq!(snap.data["n"], expected);
    }
}

#[tokio::test]
async fn test_lagging_subscriber_skips_to_latest_commit() {
    let store = MemoryStore::spawn(StoreConfig {
        snapshot_buffer: 2,
        ..StoreConfig::default()
    });
    let id = store.create("games", doc(json!({ "n": 0 }))).await.unwrap();
    let mut sub = store.subscribe("games", &id).await.unwrap();

    // Nobody reads while ten commits land; the store must not stall.
    for n in 1..=10 {
        store
            .update("games", &id, vec![FieldUpdate::set("n", n)])
            .await
            .unwrap();
    }

    assert_eq!(sub.next().await.unwrap().data["n"], 9);
    assert_eq!(sub.next().await.unwrap().data["n"], 10);
    assert!(sub.try_next().is_none());

    store
        .update("games", &id, vec![FieldUpdate::set("n", 11)])
        .await
        .unwrap();
    assert_eq!(sub.next().await.unwrap().data["n"], 11);
}

#[tokio::test]
async fn test_subscribe_missing_document_not_found() {
    let store = store();
    let result = store.subscribe("games", &DocumentId::new("nope")).await;
    assert!(matches!(result, Err(StoreError::NotFound { .. })));
}

#[tokio::test]
async fn test_every_subscriber_sees_each_commit() {
    let store = store();
    let id = store.create("games", Document::new()).await.unwrap();
    let mut a = store.subscribe("games", &id).await.unwrap();
    let mut b = store.subscribe("games", &id).await.unwrap();
    assert_ne!(a.watch_id(), b.watch_id());

    store
        .update("games", &id, vec![FieldUpdate::set("x", true)])
        .await
        .unwrap();

    for sub in [&mut a, &mut b] {
        assert!(sub.next().await.unwrap().data.is_empty());
        assert_eq!(sub.next().await.unwrap().data["x"], true);
    }
}

#[tokio::test]
async fn test_other_documents_do_not_notify() {
    let store = store();
    let watched = store.create("games", Document::new()).await.unwrap();
    let other = store.create("games", Document::new()).await.unwrap();
    let mut sub = store.subscribe("games", &watched).await.unwrap();
    sub.next().await.unwrap();

    store
        .update("games", &other, vec![FieldUpdate::set("x", 1)])
        .await
        .unwrap();
    // Round-trip through the actor so any stray snapshot would have landed.
    store.get("games", &other).await.unwrap();
    assert!(sub.try_next().is_none());
}

#[tokio::test]
async fn test_cancel_leaves_other_subscribers_intact() {
    let store = store();
    let id = store.create("games", Document::new()).await.unwrap();
    let sub = store.subscribe("games", &id).await.unwrap();
    let mut kept = store.subscribe("games", &id).await.unwrap();
    sub.cancel();

    store
        .update("games", &id, vec![FieldUpdate::set("x", 1)])
        .await
        .unwrap();

    kept.next().await.unwrap();
    assert_eq!(kept.next().await.unwrap().data["x"], 1);
}

#[tokio::test]
async fn test_shutdown_ends_subscriptions_and_fails_calls() {
    let store = store();
    let id = store.create("games", Document::new()).await.unwrap();
    let mut sub = store.subscribe("games", &id).await.unwrap();
    sub.next().await.unwrap();

    store.shutdown().await.unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(1), sub.next())
        .await
        .expect("subscription should end after shutdown");
    assert!(ended.is_none());
    assert!(matches!(
        store.get("games", &id).await,
        Err(StoreError::Unavailable)
    ));
}
