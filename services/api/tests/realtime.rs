//! Exercises the realtime core end to end over in-memory connections.

use api_lib::adapters::MemoryAdapter;
use api_lib::realtime::{Connection, Realtime};
use api_lib::web::protocol::{ClientMessage, ServerMessage};
use async_trait::async_trait;
use mentor_chat_core::domain::{Conversation, Identity, Message, MessageDraft, PairKey};
use mentor_chat_core::ports::{ConversationStore, PortError, PortResult};
use serde_json::json;
use std::sync::Arc;
use tokio::sync::mpsc::UnboundedReceiver;

fn id(raw: &str) -> Identity {
    Identity::new(raw).unwrap()
}

fn event(value: serde_json::Value) -> ClientMessage {
    serde_json::from_value::<ClientMessage>(value).unwrap()
}

fn drain(rx: &mut UnboundedReceiver<ServerMessage>) -> Vec<ServerMessage> {
    let mut out = Vec::new();
    while let Ok(message) = rx.try_recv() {
        out.push(message);
    }
    out
}

fn received_texts(messages: &[ServerMessage]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|m| match m {
            ServerMessage::ReceiveMessage(payload) => payload.text.clone(),
            _ => None,
        })
        .collect()
}

fn has_error(messages: &[ServerMessage]) -> bool {
    messages.iter().any(|m| matches!(m, ServerMessage::Error { .. }))
}

struct Setup {
    store: Arc<MemoryAdapter>,
    realtime: Realtime,
}

fn setup() -> Setup {
    let store = Arc::new(MemoryAdapter::new());
    let realtime = Realtime::new(store.clone());
    Setup { store, realtime }
}

async fn join(realtime: &Realtime, connection: &Connection, a: &str, b: &str) {
    realtime
        .handle_client_message(
            connection,
            event(json!({"event": "joinRoom", "data": {"idA": a, "idB": b}})),
        )
        .await;
}

fn text_draft(a: &str, b: &str, sender: &str, text: &str) -> MessageDraft {
    MessageDraft {
        id_a: Some(a.to_string()),
        id_b: Some(b.to_string()),
        sender_id: Some(sender.to_string()),
        text: Some(text.to_string()),
        ..Default::default()
    }
}

/// A store whose writes always fail.
struct FailingStore;

#[async_trait]
impl ConversationStore for FailingStore {
    async fn append_message(&self, _pair: &PairKey, _message: Message) -> PortResult<Message> {
        Err(PortError::Unexpected("database is down".to_string()))
    }

    async fn get_conversation(&self, _pair: &PairKey) -> PortResult<Option<Conversation>> {
        Err(PortError::Unexpected("database is down".to_string()))
    }
}

//=========================================================================================
// Presence
//=========================================================================================

#[tokio::test]
async fn presence_snapshot_reaches_every_connection() {
    let Setup { realtime, .. } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    let (bob, mut bob_rx) = realtime.connect(id("bob")).await;

    realtime
        .handle_client_message(&alice, event(json!({"event": "userOnline", "data": "alice"})))
        .await;
    realtime
        .handle_client_message(
            &bob,
            event(json!({"event": "userOnline", "data": {"identity": "bob"}})),
        )
        .await;

    let last = drain(&mut alice_rx).pop().unwrap();
    assert_eq!(drain(&mut bob_rx).pop().unwrap(), last);
    match last {
        ServerMessage::UpdateOnlineStatus(map) => {
            assert_eq!(map.len(), 2);
            assert_eq!(map["alice"], alice.id);
            assert_eq!(map["bob"], bob.id);
        }
        other => panic!("unexpected event {:?}", other),
    }
}

#[tokio::test]
async fn disconnect_broadcasts_the_reduced_snapshot() {
    let Setup { realtime, .. } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    let (bob, _bob_rx) = realtime.connect(id("bob")).await;
    realtime.mark_online(&alice).await;
    realtime.mark_online(&bob).await;
    drain(&mut alice_rx);

    realtime.disconnect(&bob).await;

    let events = drain(&mut alice_rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerMessage::UpdateOnlineStatus(map) => {
            assert_eq!(map.len(), 1);
            assert!(map.contains_key("alice"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(!realtime.presence().is_online(&id("bob")).await);

    // A second teardown changes nothing and broadcasts nothing.
    realtime.disconnect(&bob).await;
    assert!(drain(&mut alice_rx).is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 8)]
async fn last_snapshot_is_complete_under_concurrent_connects() {
    for _ in 0..100 {
        let realtime = Arc::new(Realtime::new(Arc::new(MemoryAdapter::new())));
        let (_watcher, mut watcher_rx) = realtime.connect(id("watcher")).await;

        let mut handles = Vec::new();
        for i in 0..16 {
            let realtime = realtime.clone();
            handles.push(tokio::spawn(async move {
                let (connection, rx) = realtime.connect(id(&format!("user-{}", i))).await;
                realtime.mark_online(&connection).await;
                rx
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let last = drain(&mut watcher_rx)
            .into_iter()
            .filter_map(|m| match m {
                ServerMessage::UpdateOnlineStatus(map) => Some(map),
                _ => None,
            })
            .last()
            .unwrap();
        assert_eq!(last.len(), 16);
    }
}

#[tokio::test]
async fn announcing_someone_else_is_rejected() {
    let Setup { realtime, .. } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;

    realtime
        .handle_client_message(&alice, event(json!({"event": "userOnline", "data": "mallory"})))
        .await;

    assert!(has_error(&drain(&mut alice_rx)));
    assert!(realtime.presence().snapshot().await.is_empty());
}

//=========================================================================================
// Message pipeline
//=========================================================================================

#[tokio::test]
async fn first_message_creates_the_conversation_and_reaches_the_room() {
    let Setup { store, realtime } = setup();
    let (mentor, mut mentor_rx) = realtime.connect(id("mentor-1")).await;
    let (user, mut user_rx) = realtime.connect(id("user-7")).await;
    join(&realtime, &mentor, "mentor-1", "user-7").await;
    join(&realtime, &user, "user-7", "mentor-1").await;

    realtime
        .handle_client_message(
            &user,
            event(json!({"event": "sendMessage", "data": {
                "mentorId": "mentor-1", "userId": "user-7", "senderId": "user-7", "text": "hello"
            }})),
        )
        .await;

    assert_eq!(store.conversation_count().await, 1);
    assert_eq!(received_texts(&drain(&mut mentor_rx)), vec!["hello"]);
    // The sender's own connection receives the broadcast as well.
    assert_eq!(received_texts(&drain(&mut user_rx)), vec!["hello"]);
}

#[tokio::test]
async fn voice_message_is_relayed_with_its_reference_only() {
    let Setup { store, realtime } = setup();
    let (mentor, mut mentor_rx) = realtime.connect(id("mentor-1")).await;
    let (user, mut user_rx) = realtime.connect(id("user-7")).await;
    join(&realtime, &mentor, "mentor-1", "user-7").await;
    join(&realtime, &user, "mentor-1", "user-7").await;

    realtime
        .handle_client_message(
            &user,
            event(json!({"event": "sendMessage", "data": {
                "mentorId": "mentor-1", "userId": "user-7", "senderId": "user-7",
                "type": "voice", "voiceUrl": "recordings/v-1.webm"
            }})),
        )
        .await;

    let events = drain(&mut mentor_rx);
    assert_eq!(events.len(), 1);
    let ServerMessage::ReceiveMessage(payload) = &events[0] else {
        panic!("unexpected event {:?}", events[0]);
    };
    assert_eq!(payload.kind, "voice");
    assert_eq!(payload.voice_ref.as_deref(), Some("recordings/v-1.webm"));
    assert_eq!(payload.text, None);

    let wire = serde_json::to_value(&events[0]).unwrap();
    assert_eq!(wire["data"]["voiceRef"], "recordings/v-1.webm");
    assert!(wire["data"].get("text").is_none());

    assert_eq!(drain(&mut user_rx), events);
    assert_eq!(store.conversation_count().await, 1);
}

#[tokio::test]
async fn reversed_pair_appends_to_the_same_conversation() {
    let Setup { store, realtime } = setup();
    let alice = id("alice");
    let bob = id("bob");

    realtime
        .send_message(text_draft("alice", "bob", "alice", "one"), &alice)
        .await
        .unwrap();
    realtime
        .send_message(text_draft("bob", "alice", "bob", "two"), &bob)
        .await
        .unwrap();

    assert_eq!(store.conversation_count().await, 1);
    let pair = PairKey::new(bob, alice).unwrap();
    let history = realtime.history(&pair).await.unwrap();
    let texts: Vec<_> = history.iter().filter_map(|m| m.body.text()).collect();
    assert_eq!(texts, vec!["one", "two"]);
}

#[tokio::test]
async fn broadcast_only_happens_after_the_message_is_stored() {
    let Setup { store, realtime } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    join(&realtime, &alice, "alice", "bob").await;

    realtime
        .send_message(text_draft("alice", "bob", "alice", "persisted"), &alice.identity)
        .await
        .unwrap();

    let pair = PairKey::new(id("alice"), id("bob")).unwrap();
    let stored = store.get_conversation(&pair).await.unwrap().unwrap();
    assert_eq!(stored.messages.len(), 1);
    assert_eq!(received_texts(&drain(&mut alice_rx)), vec!["persisted"]);
}

#[tokio::test]
async fn message_is_stored_even_when_nobody_is_in_the_room() {
    let Setup { store, realtime } = setup();
    let stored = realtime
        .send_message(text_draft("alice", "bob", "alice", "offline note"), &id("alice"))
        .await
        .unwrap();

    assert_eq!(stored.body.text(), Some("offline note"));
    assert_eq!(store.conversation_count().await, 1);
}

#[tokio::test]
async fn history_of_an_unknown_pair_is_empty() {
    let Setup { realtime, .. } = setup();
    let pair = PairKey::new(id("alice"), id("carol")).unwrap();
    assert!(realtime.history(&pair).await.unwrap().is_empty());
}

#[tokio::test]
async fn malformed_message_is_reported_and_not_stored() {
    let Setup { store, realtime } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    join(&realtime, &alice, "alice", "bob").await;

    realtime
        .handle_client_message(
            &alice,
            event(json!({"event": "sendMessage", "data": {"idA": "alice", "senderId": "alice", "text": "hi"}})),
        )
        .await;
    realtime
        .handle_client_message(
            &alice,
            event(json!({"event": "sendMessage", "data": {
                "idA": "alice", "idB": "bob", "senderId": "alice", "type": "voice"
            }})),
        )
        .await;

    let events = drain(&mut alice_rx);
    assert_eq!(
        events.iter().filter(|m| matches!(m, ServerMessage::Error { .. })).count(),
        2
    );
    assert!(received_texts(&events).is_empty());
    assert_eq!(store.conversation_count().await, 0);
}

#[tokio::test]
async fn sender_cannot_speak_for_someone_else() {
    let Setup { store, realtime } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    let (bob, mut bob_rx) = realtime.connect(id("bob")).await;
    join(&realtime, &alice, "alice", "bob").await;
    join(&realtime, &bob, "alice", "bob").await;

    realtime
        .handle_client_message(
            &alice,
            event(json!({"event": "sendMessage", "data": {
                "idA": "alice", "idB": "bob", "senderId": "bob", "text": "forged"
            }})),
        )
        .await;

    assert!(has_error(&drain(&mut alice_rx)));
    assert!(drain(&mut bob_rx).is_empty());
    assert_eq!(store.conversation_count().await, 0);
}

#[tokio::test]
async fn ack_follows_the_broadcast() {
    let Setup { realtime, .. } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    join(&realtime, &alice, "alice", "bob").await;

    realtime
        .handle_client_message(
            &alice,
            event(json!({"event": "sendMessage", "data": {
                "idA": "alice", "idB": "bob", "senderId": "alice", "text": "hi", "clientRef": "c-1"
            }})),
        )
        .await;

    let events = drain(&mut alice_rx);
    assert_eq!(events.len(), 2);
    assert!(matches!(events[0], ServerMessage::ReceiveMessage(_)));
    assert_eq!(
        events[1],
        ServerMessage::MessageAck {
            client_ref: "c-1".to_string()
        }
    );
}

#[tokio::test]
async fn persistence_failure_is_reported_to_the_sender_only() {
    let realtime = Realtime::new(Arc::new(FailingStore));
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    let (bob, mut bob_rx) = realtime.connect(id("bob")).await;
    join(&realtime, &alice, "alice", "bob").await;
    join(&realtime, &bob, "alice", "bob").await;

    realtime
        .handle_client_message(
            &alice,
            event(json!({"event": "sendMessage", "data": {
                "idA": "alice", "idB": "bob", "senderId": "alice", "text": "lost", "clientRef": "c-9"
            }})),
        )
        .await;

    let events = drain(&mut alice_rx);
    assert_eq!(events.len(), 1);
    match &events[0] {
        ServerMessage::MessageFailed { client_ref, .. } => {
            assert_eq!(client_ref.as_deref(), Some("c-9"));
        }
        other => panic!("unexpected event {:?}", other),
    }
    assert!(drain(&mut bob_rx).is_empty());
}

#[tokio::test]
async fn concurrent_first_messages_share_one_conversation() {
    let store = Arc::new(MemoryAdapter::new());
    let realtime = Arc::new(Realtime::new(store.clone()));

    let mut handles = Vec::new();
    for i in 0..10 {
        let realtime = realtime.clone();
        handles.push(tokio::spawn(async move {
            let (sender, a, b) = if i % 2 == 0 {
                ("alice", "alice", "bob")
            } else {
                ("bob", "bob", "alice")
            };
            realtime
                .send_message(text_draft(a, b, sender, &format!("m{}", i)), &id(sender))
                .await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.conversation_count().await, 1);
    let pair = PairKey::new(id("alice"), id("bob")).unwrap();
    assert_eq!(realtime.history(&pair).await.unwrap().len(), 10);
}

//=========================================================================================
// Rooms, typing and call signalling
//=========================================================================================

#[tokio::test]
async fn cannot_join_a_room_you_are_not_part_of() {
    let Setup { realtime, .. } = setup();
    let (mallory, mut mallory_rx) = realtime.connect(id("mallory")).await;

    join(&realtime, &mallory, "alice", "bob").await;

    assert!(has_error(&drain(&mut mallory_rx)));
    assert_eq!(realtime.rooms().room_of(mallory.id).await, None);
}

#[tokio::test]
async fn typing_reaches_the_peer_but_not_the_sender() {
    let Setup { realtime, .. } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    let (bob, mut bob_rx) = realtime.connect(id("bob")).await;
    join(&realtime, &alice, "alice", "bob").await;
    join(&realtime, &bob, "bob", "alice").await;

    realtime
        .handle_client_message(
            &alice,
            event(json!({"event": "typing", "data": {
                "idA": "bob", "idB": "alice", "senderId": "alice", "isTyping": true
            }})),
        )
        .await;

    assert_eq!(
        drain(&mut bob_rx),
        vec![ServerMessage::DisplayTyping {
            sender_id: "alice".to_string(),
            is_typing: true
        }]
    );
    assert!(drain(&mut alice_rx).is_empty());
}

#[tokio::test]
async fn typing_as_someone_else_is_rejected() {
    let Setup { realtime, .. } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    let (bob, mut bob_rx) = realtime.connect(id("bob")).await;
    join(&realtime, &alice, "alice", "bob").await;
    join(&realtime, &bob, "alice", "bob").await;

    realtime
        .handle_client_message(
            &alice,
            event(json!({"event": "typing", "data": {
                "idA": "alice", "idB": "bob", "senderId": "bob", "isTyping": true
            }})),
        )
        .await;

    assert!(has_error(&drain(&mut alice_rx)));
    assert!(drain(&mut bob_rx).is_empty());
}

#[tokio::test]
async fn signalling_stays_inside_the_room_and_is_verbatim() {
    let Setup { realtime, .. } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    let (bob, mut bob_rx) = realtime.connect(id("bob")).await;
    let (carol, mut carol_rx) = realtime.connect(id("carol")).await;
    join(&realtime, &alice, "alice", "bob").await;
    join(&realtime, &bob, "alice", "bob").await;
    join(&realtime, &carol, "carol", "alice").await;

    let offer = json!({"type": "offer", "sdp": "v=0\r\no=- 42 2 IN IP4 127.0.0.1", "extra": [1, 2]});
    realtime
        .handle_client_message(&alice, event(json!({"event": "offer", "data": offer.clone()})))
        .await;
    realtime
        .handle_client_message(&bob, event(json!({"event": "endCall"})))
        .await;

    assert_eq!(
        drain(&mut bob_rx),
        vec![ServerMessage::Offer(offer)]
    );
    assert_eq!(drain(&mut alice_rx), vec![ServerMessage::EndCall]);
    assert!(drain(&mut carol_rx).is_empty());
}

#[tokio::test]
async fn signalling_without_a_room_is_dropped() {
    let Setup { realtime, .. } = setup();
    let (alice, mut alice_rx) = realtime.connect(id("alice")).await;
    let (_bob, mut bob_rx) = realtime.connect(id("bob")).await;

    realtime
        .handle_client_message(&alice, event(json!({"event": "candidate", "data": {"candidate": "x"}})))
        .await;

    assert!(drain(&mut alice_rx).is_empty());
    assert!(drain(&mut bob_rx).is_empty());
}

#[tokio::test]
async fn offer_after_the_peer_left_reaches_nobody() {
    let Setup { realtime, .. } = setup();
    let (alice, _alice_rx) = realtime.connect(id("alice")).await;
    let (bob, _bob_rx) = realtime.connect(id("bob")).await;
    join(&realtime, &alice, "alice", "bob").await;
    join(&realtime, &bob, "alice", "bob").await;

    realtime.disconnect(&bob).await;

    let delivered = realtime
        .relay_signal(&alice, api_lib::realtime::Signal::Offer(json!({"sdp": "x"})))
        .await;
    assert_eq!(delivered, 0);
}
