//! Integration tests for the store server, the remote store client, and
//! two full clients playing over real WebSocket connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tictac::prelude::*;
use tictac_protocol::{Envelope, Payload, StoreReply, StoreRequest};
use tokio_tungstenite::tungstenite::Message;

// =========================================================================
// Helpers
// =========================================================================

type ClientWs = tokio_tungstenite::WebSocketStream<
    tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
>;

/// Starts a server on a random port and returns its URL and backing store.
async fn start_server() -> (String, MemoryStore) {
    let server = StoreServer::builder()
        .bind("127.0.0.1:0")
        .build()
        .await
        .expect("server should build");

    let url = format!("ws://{}", server.local_addr().expect("local addr"));
    let store = server.store().clone();

    tokio::spawn(async move {
        let _ = server.run().await;
    });

    (url, store)
}

async fn connect_raw(url: &str) -> ClientWs {
    let (ws, _) = tokio_tungstenite::connect_async(url)
        .await
        .expect("should connect");
    ws
}

fn encode_envelope(envelope: &Envelope) -> Message {
    let bytes = serde_json::to_vec(envelope).expect("encode");
    Message::Binary(bytes.into())
}

fn decode_envelope(msg: Message) -> Envelope {
    serde_json::from_slice(&msg.into_data()).expect("decode")
}

async fn recv_envelope(ws: &mut ClientWs) -> Envelope {
    let msg = tokio::time::timeout(Duration::from_secs(2), ws.next())
        .await
        .expect("timed out waiting for a frame")
        .expect("stream ended")
        .expect("websocket error");
    decode_envelope(msg)
}

fn doc(value: serde_json::Value) -> Document {
    match value {
        serde_json::Value::Object(map) => map,
        _ => panic!("test document must be an object"),
    }
}

fn binder(store: RemoteStore, user: &str) -> SessionBinder<RemoteStore, NoopNotifier> {
    SessionBinder::new(
        GameStore::new(store),
        NoopNotifier,
        UserId::new(user),
        BinderConfig::default(),
    )
}

async fn next_view(
    binder: &mut SessionBinder<RemoteStore, NoopNotifier>,
) -> LocalGameView {
    tokio::time::timeout(Duration::from_secs(2), binder.next_snapshot())
        .await
        .expect("timed out waiting for a snapshot")
        .expect("subscription ended")
}

// =========================================================================
// Handshake
// =========================================================================

#[tokio::test]
async fn test_handshake_returns_welcome() {
    let (url, _store) = start_server().await;
    let mut ws = connect_raw(&url).await;

    let hello = Envelope {
        seq: 7,
        payload: Payload::Request(StoreRequest::Hello {
            version: PROTOCOL_VERSION,
        }),
    };
    ws.send(encode_envelope(&hello)).await.unwrap();

    let reply = recv_envelope(&mut ws).await;
    assert_eq!(reply.seq, 7);
    match reply.payload {
        Payload::Reply(StoreReply::Welcome { server_time }) => {
            assert!(server_time > 0);
        }
        other => panic!("expected Welcome, got {other:?}"),
    }
}

#[tokio::test]
async fn test_handshake_wrong_version_rejected() {
    let (url, _store) = start_server().await;
    let mut ws = connect_raw(&url).await;

    let hello = Envelope {
        seq: 1,
        payload: Payload::Request(StoreRequest::Hello { version: 99 }),
    };
    ws.send(encode_envelope(&hello)).await.unwrap();

    let reply = recv_envelope(&mut ws).await;
    match reply.payload {
        Payload::Reply(StoreReply::Error { code, message }) => {
            assert_eq!(code, 400);
            assert!(message.contains("version mismatch"), "got {message}");
        }
        other => panic!("expected Error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_first_message_must_be_hello() {
    let (url, _store) = start_server().await;
    let mut ws = connect_raw(&url).await;

    let get = Envelope {
        seq: 1,
        payload: Payload::Request(StoreRequest::Get {
            collection: "games".into(),
            id: DocumentId::new("x"),
        }),
    };
    ws.send(encode_envelope(&get)).await.unwrap();

    let reply = recv_envelope(&mut ws).await;
    assert!(matches!(
        reply.payload,
        Payload::Reply(StoreReply::Error { code: 400, .. })
    ));
}

#[tokio::test]
async fn test_replies_carry_request_seq() {
    let (url, _store) = start_server().await;
    let mut ws = connect_raw(&url).await;
    let hello = Envelope {
        seq: 0,
        payload: Payload::Request(StoreRequest::Hello {
            version: PROTOCOL_VERSION,
        }),
    };
    ws.send(encode_envelope(&hello)).await.unwrap();
    recv_envelope(&mut ws).await;

    let get = Envelope {
        seq: 42,
        payload: Payload::Request(StoreRequest::Get {
            collection: "games".into(),
            id: DocumentId::new("missing"),
        }),
    };
    ws.send(encode_envelope(&get)).await.unwrap();

    let reply = recv_envelope(&mut ws).await;
    assert_eq!(reply.seq, 42);
    assert_eq!(
        reply.payload,
        Payload::Reply(StoreReply::Document { data: None })
    );
}

#[tokio::test]
async fn test_connect_reports_server_time() {
    let (url, _store) = start_server().await;
    let store = RemoteStore::connect(&url).await.unwrap();
    assert!(store.server_time() > 0);
    assert!(!store.is_closed());
}

// =========================================================================
// Remote store
// =========================================================================

#[tokio::test]
async fn test_remote_create_get_update_round_trip() {
    let (url, _store) = start_server().await;
    let store = RemoteStore::connect(&url).await.unwrap();

    let id = store
        .create("games", doc(json!({ "board": ["", ""] })))
        .await
        .unwrap();
    store
        .update("games", &id, vec![FieldUpdate::set("board.1", "X")])
        .await
        .unwrap();

    let fetched = store.get("games", &id).await.unwrap().unwrap();
    assert_eq!(fetched["board"], json!(["", "X"]));
    assert_eq!(store.get("games", &DocumentId::new("nope")).await.unwrap(), None);
}

#[tokio::test]
async fn test_remote_errors_map_to_store_errors() {
    let (url, _store) = start_server().await;
    let store = RemoteStore::connect(&url).await.unwrap();

    let missing = DocumentId::new("nope");
    let err = store
        .update("games", &missing, vec![FieldUpdate::set("a", 1)])
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotFound { ref id, .. } if *id == missing));

    let id = store.create("games", Document::new()).await.unwrap();
    let err = store
        .update("games", &id, vec![FieldUpdate::set("a..b", 1)])
        .await
        .unwrap_err();
    assert_eq!(err.code(), 400);

    let err = store.subscribe("games", &missing).await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound { .. }));
}

#[tokio::test]
async fn test_remote_subscription_sees_other_clients_writes() {
    let (url, _store) = start_server().await;
    let writer = RemoteStore::connect(&url).await.unwrap();
    let watcher = RemoteStore::connect(&url).await.unwrap();

    let id = writer.create("games", doc(json!({ "n": 0 }))).await.unwrap();
    let mut sub = watcher.subscribe("games", &id).await.unwrap();

    for n in 1..=3 {
        writer
            .update("games", &id, vec![FieldUpdate::set("n", n)])
            .await
            .unwrap();
    }

    for expected in 0..=3 {
        let snap = tokio::time::timeout(Duration::from_secs(2), sub.next())
            .await
            .expect("timed out")
            .expect("subscription ended");
        assert_eq!(snap.id, id);
        assert_eq!(snap.data["n"], expected);
    }
}

#[tokio::test]
async fn test_remote_cancel_keeps_other_watches() {
    let (url, _store) = start_server().await;
    let store = RemoteStore::connect(&url).await.unwrap();
    let id = store.create("games", Document::new()).await.unwrap();

    let cancelled = store.subscribe("games", &id).await.unwrap();
    let mut kept = store.subscribe("games", &id).await.unwrap();
    assert_ne!(cancelled.watch_id(), kept.watch_id());
    cancelled.cancel();

    store
        .update("games", &id, vec![FieldUpdate::set("x", 1)])
        .await
        .unwrap();

    kept.next().await.unwrap();
    let snap = tokio::time::timeout(Duration::from_secs(2), kept.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snap.data["x"], 1);
}

#[tokio::test]
async fn test_server_side_writes_reach_remote_watchers() {
    let (url, server_store) = start_server().await;
    let store = RemoteStore::connect(&url).await.unwrap();
    let id = server_store.create("games", Document::new()).await.unwrap();

    let mut sub = store.subscribe("games", &id).await.unwrap();
    sub.next().await.unwrap();
    server_store
        .update("games", &id, vec![FieldUpdate::set("from", "server")])
        .await
        .unwrap();

    let snap = tokio::time::timeout(Duration::from_secs(2), sub.next())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snap.data["from"], "server");
}

#[tokio::test]
async fn test_closed_connection_fails_calls_and_ends_subscriptions() {
    let (url, _store) = start_server().await;
    let store = RemoteStore::connect(&url).await.unwrap();
    let id = store.create("games", Document::new()).await.unwrap();
    let mut sub = store.subscribe("games", &id).await.unwrap();
    sub.next().await.unwrap();

    store.close().await.unwrap();

    let ended = tokio::time::timeout(Duration::from_secs(2), sub.next())
        .await
        .expect("subscription should end when the connection closes");
    assert!(ended.is_none());
    assert!(store.is_closed());
    assert!(matches!(
        store.get("games", &id).await,
        Err(StoreError::Unavailable)
    ));
}

// =========================================================================
// Two clients, one game
// =========================================================================

#[tokio::test]
async fn test_two_clients_play_over_the_network() {
    let (url, _store) = start_server().await;
    let mut alice = binder(RemoteStore::connect(&url).await.unwrap(), "alice");
    let mut bob = binder(RemoteStore::connect(&url).await.unwrap(), "bob");

    let code = alice.host().await.unwrap();
    let view = next_view(&mut alice).await;
    assert_eq!(view.state, BinderState::Bound(Phase::WaitingForOpponent));

    bob.join(&code).await.unwrap();
    let view = next_view(&mut bob).await;
    assert_eq!(view.state, BinderState::Bound(Phase::InProgress));
    assert!(!view.is_local_turn);
    let view = next_view(&mut alice).await;
    assert_eq!(view.state, BinderState::Bound(Phase::InProgress));

    assert_eq!(alice.attempt_move(4).await.unwrap(), MoveAttempt::Submitted);
    let view = next_view(&mut bob).await;
    let session = view.session.clone().unwrap();
    assert_eq!(session.board.get(4), Some(Cell::X));
    assert_eq!(session.current_player, Mark::O);
    assert!(view.is_local_turn);
    next_view(&mut alice).await;

    // A third player is turned away.
    let mut carol = binder(RemoteStore::connect(&url).await.unwrap(), "carol");
    let err = carol.join(&code).await.unwrap_err();
    assert_eq!(err.join_rejection(), Some(JoinRejection::SlotTaken));

    // Bob leaves; Alice keeps playing against the stored document.
    bob.leave();
    assert_eq!(bob.state(), BinderState::Unbound);
    assert_eq!(
        alice.attempt_move(0).await.unwrap(),
        MoveAttempt::Ignored(IgnoreReason::NotYourTurn)
    );
}

#[tokio::test]
async fn test_full_game_over_network_ends_in_win_then_reset() {
    let (url, _store) = start_server().await;
    let mut alice = binder(RemoteStore::connect(&url).await.unwrap(), "alice");
    let mut bob = binder(RemoteStore::connect(&url).await.unwrap(), "bob");

    let code = alice.host().await.unwrap();
    next_view(&mut alice).await;
    bob.join(&code).await.unwrap();
    next_view(&mut bob).await;
    next_view(&mut alice).await;

    for (n, index) in [0, 3, 1, 4, 2].into_iter().enumerate() {
        let (mover, other) = if n % 2 == 0 {
            (&mut alice, &mut bob)
        } else {
            (&mut bob, &mut alice)
        };
        assert_eq!(mover.attempt_move(index).await.unwrap(), MoveAttempt::Submitted);
        next_view(mover).await;
        next_view(other).await;
    }

    let view = bob.view();
    assert_eq!(view.state, BinderState::Bound(Phase::Finished));
    let session = view.session.unwrap();
    assert_eq!(session.winner, Some(Winner::X));
    assert_eq!(session.winning_line, Some([0, 1, 2]));

    bob.attempt_reset().await.unwrap();
    let view = next_view(&mut alice).await;
    assert_eq!(view.state, BinderState::Bound(Phase::InProgress));
    assert_eq!(view.session.unwrap().board, Board::empty());
}
