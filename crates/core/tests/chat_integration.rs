//! Chat Widget Integration Tests
//!
//! This test suite validates the full widget lifecycle against an in-memory
//! broker.
//!
//! # Testing Architecture
//!
//! ## Unit Tests (in-module)
//! Located in each module's `#[cfg(test)]` section, these test individual
//! components without a broker.
//!
//! ## Integration Tests (this file)
//! These tests drive a complete [`ChatWidget`] through open, send, receive,
//! drop/reconnect, retry-exhaustion, and close scenarios using the channel
//! transport from the common module.
//!
//! # Running Tests
//!
//! ```bash
//! # Run unit tests only (fast)
//! cargo test -p chatkit-core --lib
//!
//! # Run integration tests
//! cargo test -p chatkit-core --test chat_integration
//! ```

mod common;

use std::sync::Arc;

use common::{init_test_logging, with_timeout, BrokerLink, TestConnector};

use chatkit_core::{
    ChatConfig, ChatWidget, CloseBehavior, ConnectionState, Error, Frame, ProtocolDialect,
    ReconnectPolicy, ResponderMode, SenderKind, TypingState, WidgetEvent,
};
use tokio::sync::mpsc;

fn test_config(dialect: ProtocolDialect) -> ChatConfig {
    ChatConfig {
        endpoint: "ws://test/ws".to_string(),
        dialect,
        responder: ResponderMode::Automated,
        close_behavior: CloseBehavior::Teardown,
        reconnect: ReconnectPolicy {
            max_attempts: 3,
            base_delay_ms: 1,
            max_delay_ms: 2,
        },
        typing_timeout_ms: 15_000,
        optimistic_echo: true,
        welcome_message: None,
    }
}

async fn open_widget(
    config: ChatConfig,
) -> (ChatWidget, Arc<TestConnector>, mpsc::UnboundedReceiver<BrokerLink>, BrokerLink) {
    let (connector, mut links) = TestConnector::new();
    let connector = Arc::new(connector);
    let widget = with_timeout(ChatWidget::open(config, connector.clone(), None, None))
        .await
        .expect("widget should open");
    let link = links.try_recv().expect("link for initial connect");
    (widget, connector, links, link)
}

/// Opening the widget performs the handshake and subscribes exactly once.
#[tokio::test]
async fn test_open_handshake_and_subscription() {
    init_test_logging();
    let (mut widget, _connector, _links, mut link) =
        open_widget(test_config(ProtocolDialect::Broadcast)).await;

    assert_eq!(widget.state(), ConnectionState::Connected);
    match with_timeout(widget.next_event()).await.unwrap() {
        WidgetEvent::StateChanged(ConnectionState::Connected) => {}
        other => panic!("unexpected event: {other:?}"),
    }

    let sent = link.drain_sent();
    assert_eq!(sent.len(), 2);
    assert!(matches!(&sent[0], Frame::Connect { session_id }
        if *session_id == widget.session().session_id));
    assert!(matches!(&sent[1], Frame::Subscribe { destination }
        if destination == "/topic/public"));
}

/// Sending publishes to the application destination, echoes locally, and
/// raises the typing indicator.
#[tokio::test]
async fn test_send_echo_and_typing() {
    init_test_logging();
    let (mut widget, _connector, _links, mut link) =
        open_widget(test_config(ProtocolDialect::Broadcast)).await;
    link.drain_sent();

    let msg = widget.send("Hello").await.unwrap();
    assert_eq!(msg.content, "Hello");
    assert_eq!(widget.typing_state(), TypingState::Waiting);

    let sent = link.drain_sent();
    assert_eq!(sent.len(), 1);
    match &sent[0] {
        Frame::Send { destination, body } => {
            assert_eq!(destination, "/app/chat.sendMessage");
            assert_eq!(body["content"], "Hello");
            assert_eq!(body["sender"], "USER");
        }
        other => panic!("unexpected frame: {other:?}"),
    }

    // One transcript entry from the local echo.
    let transcript = widget.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].sender_kind, SenderKind::User);

    // The pending events are the state change from open, then the
    // typing-indicator raise.
    let mut events = Vec::new();
    events.push(with_timeout(widget.next_event()).await.unwrap());
    events.push(with_timeout(widget.next_event()).await.unwrap());
    assert!(events.contains(&WidgetEvent::TypingChanged(TypingState::Waiting)));
}

/// A responder reply clears the typing indicator and lands in the
/// transcript exactly once, even when redelivered.
#[tokio::test]
async fn test_reply_clears_typing_and_deduplicates() {
    init_test_logging();
    let (mut widget, _connector, _links, mut link) =
        open_widget(test_config(ProtocolDialect::Broadcast)).await;
    link.drain_sent();
    with_timeout(widget.next_event()).await.unwrap(); // StateChanged(Connected)

    widget.send("Hi").await.unwrap();
    with_timeout(widget.next_event()).await.unwrap(); // TypingChanged(Waiting)

    let reply = serde_json::json!({
        "id": "m1",
        "content": "How can I help?",
        "sender": "AI",
        "timestamp": "2024-05-01T12:30:00Z"
    });
    link.deliver("/topic/public", reply.clone());

    let first = with_timeout(widget.next_event()).await.unwrap();
    assert_eq!(first, WidgetEvent::TypingChanged(TypingState::Idle));
    let second = with_timeout(widget.next_event()).await.unwrap();
    match second {
        WidgetEvent::Message(msg) => {
            assert_eq!(msg.id.as_str(), "m1");
            assert_eq!(msg.sender_kind, SenderKind::Ai);
        }
        other => panic!("unexpected event: {other:?}"),
    }

    // Redelivery of the same id is dropped silently.
    link.deliver("/topic/public", reply);
    link.deliver(
        "/topic/public",
        serde_json::json!({
            "id": "m2",
            "content": "Anything else?",
            "sender": "AI",
            "timestamp": "2024-05-01T12:31:00Z"
        }),
    );
    match with_timeout(widget.next_event()).await.unwrap() {
        WidgetEvent::Message(msg) => assert_eq!(msg.id.as_str(), "m2"),
        other => panic!("unexpected event: {other:?}"),
    }
    // Echo + m1 + m2.
    assert_eq!(widget.transcript().len(), 3);
}

/// A dropped connection triggers an automatic reconnect that replays the
/// handshake and subscription on the fresh transport.
#[tokio::test]
async fn test_drop_reconnect_resubscribes() {
    init_test_logging();
    let (mut widget, _connector, mut links, link) =
        open_widget(test_config(ProtocolDialect::Broadcast)).await;
    with_timeout(widget.next_event()).await.unwrap(); // StateChanged(Connected)

    // Kill the broker side; the client sees a clean close.
    drop(link);

    let reconnecting = with_timeout(widget.next_event()).await.unwrap();
    assert_eq!(
        reconnecting,
        WidgetEvent::StateChanged(ConnectionState::Reconnecting)
    );
    let connected = with_timeout(widget.next_event()).await.unwrap();
    assert_eq!(
        connected,
        WidgetEvent::StateChanged(ConnectionState::Connected)
    );

    let mut new_link = links.try_recv().expect("link for reconnect");
    let sent = new_link.drain_sent();
    let connects = sent
        .iter()
        .filter(|f| matches!(f, Frame::Connect { .. }))
        .count();
    let subscribes = sent
        .iter()
        .filter(|f| matches!(f, Frame::Subscribe { .. }))
        .count();
    assert_eq!(connects, 1);
    assert_eq!(subscribes, 1);

    // Traffic flows on the new transport.
    new_link.deliver(
        "/topic/public",
        serde_json::json!({
            "id": "m5",
            "content": "back",
            "sender": "AI",
            "timestamp": "2024-05-01T12:30:00Z"
        }),
    );
    match with_timeout(widget.next_event()).await.unwrap() {
        WidgetEvent::Message(msg) => assert_eq!(msg.id.as_str(), "m5"),
        other => panic!("unexpected event: {other:?}"),
    }
}

/// Opening against a dead broker gives up after the configured number of
/// attempts.
#[tokio::test]
async fn test_open_exhausts_retries() {
    init_test_logging();
    let (connector, _links) = TestConnector::new();
    let connector = Arc::new(connector);
    connector.refuse_future_connects();

    let result = with_timeout(ChatWidget::open(
        test_config(ProtocolDialect::Broadcast),
        connector.clone(),
        None,
        None,
    ))
    .await;
    match result {
        Err(Error::RetriesExhausted { attempts }) => assert_eq!(attempts, 3),
        Err(other) => panic!("unexpected error: {other:?}"),
        Ok(_) => panic!("open should have failed"),
    }
    assert_eq!(connector.attempts(), 3);
}

/// When automatic reconnection gives up, sends are refused until an
/// explicit retry brings the connection back.
#[tokio::test]
async fn test_failed_state_blocks_sends_until_retry() {
    init_test_logging();
    let (mut widget, connector, mut links, link) =
        open_widget(test_config(ProtocolDialect::Broadcast)).await;
    with_timeout(widget.next_event()).await.unwrap(); // StateChanged(Connected)

    connector.refuse_future_connects();
    drop(link);

    assert_eq!(
        with_timeout(widget.next_event()).await.unwrap(),
        WidgetEvent::StateChanged(ConnectionState::Reconnecting)
    );
    assert_eq!(
        with_timeout(widget.next_event()).await.unwrap(),
        WidgetEvent::StateChanged(ConnectionState::Failed)
    );
    assert!(matches!(
        with_timeout(widget.next_event()).await,
        Err(Error::NotConnected)
    ));

    let before = widget.transcript().len();
    assert!(matches!(
        widget.send("anyone there?").await,
        Err(Error::NotConnected)
    ));
    assert_eq!(widget.transcript().len(), before);

    // The broker comes back; a manual retry reconnects and resubscribes.
    connector.allow_connects();
    with_timeout(widget.retry()).await.unwrap();
    assert_eq!(widget.state(), ConnectionState::Connected);
    let mut new_link = links.try_recv().expect("link for manual retry");
    let sent = new_link.drain_sent();
    assert!(sent.iter().any(|f| matches!(f, Frame::Subscribe { .. })));
    widget.send("still here").await.unwrap();
}

/// Room dialect: the room is provisioned, history replays in order, and
/// sends target the per-room destination.
#[tokio::test]
async fn test_room_dialect_history_and_destinations() {
    init_test_logging();

    struct FixedApi;

    #[async_trait::async_trait]
    impl chatkit_core::RoomApi for FixedApi {
        async fn create_room(&self, _user_id: &str) -> chatkit_core::Result<String> {
            Ok("r1".to_string())
        }

        async fn get_history(
            &self,
            room_id: &str,
        ) -> chatkit_core::Result<Vec<serde_json::Value>> {
            assert_eq!(room_id, "r1");
            Ok(vec![
                serde_json::json!({
                    "id": "h1",
                    "roomId": "r1",
                    "senderId": "agent-9",
                    "senderName": "Dana",
                    "messageType": "CHAT",
                    "content": "Earlier message",
                    "sentAt": "2024-05-01T12:00:00"
                }),
                serde_json::json!({
                    "id": "h2",
                    "roomId": "r1",
                    "senderId": "agent-9",
                    "senderName": "Dana",
                    "messageType": "CHAT",
                    "content": "Second message",
                    "sentAt": "2024-05-01T12:01:00"
                }),
            ])
        }
    }

    let (connector, mut links) = TestConnector::new();
    let mut widget = with_timeout(ChatWidget::open(
        test_config(ProtocolDialect::Room),
        Arc::new(connector),
        Some(Arc::new(FixedApi)),
        None,
    ))
    .await
    .unwrap();

    assert_eq!(widget.session().room_id.as_deref(), Some("r1"));
    let transcript = widget.transcript();
    assert_eq!(transcript.len(), 2);
    assert_eq!(transcript[0].id.as_str(), "h1");
    assert_eq!(transcript[1].id.as_str(), "h2");
    assert!(transcript[0].sequence < transcript[1].sequence);

    let mut link = links.try_recv().unwrap();
    link.drain_sent();
    widget.send("And now?").await.unwrap();
    let sent = link.drain_sent();
    match &sent[0] {
        Frame::Send { destination, body } => {
            assert_eq!(destination, "/app/chat/r1/send");
            assert_eq!(body["messageType"], "CHAT");
            assert_eq!(body["roomId"], "r1");
        }
        other => panic!("unexpected frame: {other:?}"),
    }
}

/// Room dialect: a join notification becomes a system transcript entry.
#[tokio::test]
async fn test_room_join_notice() {
    init_test_logging();

    struct NoHistoryApi;

    #[async_trait::async_trait]
    impl chatkit_core::RoomApi for NoHistoryApi {
        async fn create_room(&self, _user_id: &str) -> chatkit_core::Result<String> {
            Ok("r2".to_string())
        }

        async fn get_history(
            &self,
            _room_id: &str,
        ) -> chatkit_core::Result<Vec<serde_json::Value>> {
            Ok(Vec::new())
        }
    }

    let (connector, mut links) = TestConnector::new();
    let mut widget = with_timeout(ChatWidget::open(
        test_config(ProtocolDialect::Room),
        Arc::new(connector),
        Some(Arc::new(NoHistoryApi)),
        None,
    ))
    .await
    .unwrap();
    with_timeout(widget.next_event()).await.unwrap(); // StateChanged(Connected)

    let link = links.try_recv().unwrap();
    link.deliver(
        "/topic/room/r2",
        serde_json::json!({
            "roomId": "r2",
            "senderId": "agent-9",
            "senderName": "Dana",
            "messageType": "JOIN",
            "sentAt": "2024-05-01T12:00:00"
        }),
    );

    match with_timeout(widget.next_event()).await.unwrap() {
        WidgetEvent::Message(msg) => {
            assert_eq!(msg.sender_kind, SenderKind::System);
            assert!(msg.content.contains("Dana"));
        }
        other => panic!("unexpected event: {other:?}"),
    }
}

/// The typing indicator goes stale when no reply ever arrives.
#[tokio::test(start_paused = true)]
async fn test_typing_indicator_stale_timeout() {
    let (mut widget, _connector, _links, _link) =
        open_widget(test_config(ProtocolDialect::Broadcast)).await;
    with_timeout(widget.next_event()).await.unwrap(); // StateChanged(Connected)

    widget.send("Hello?").await.unwrap();
    assert_eq!(
        widget.next_event().await.unwrap(),
        WidgetEvent::TypingChanged(TypingState::Waiting)
    );

    // No reply; paused time auto-advances to the 15s deadline.
    assert_eq!(
        widget.next_event().await.unwrap(),
        WidgetEvent::TypingChanged(TypingState::Idle)
    );
    assert_eq!(widget.typing_state(), TypingState::Idle);
}

/// In human-agent mode the typing indicator follows explicit signals only;
/// sending never arms it.
#[tokio::test]
async fn test_human_agent_typing_signals() {
    init_test_logging();
    let mut config = test_config(ProtocolDialect::Broadcast);
    config.responder = ResponderMode::HumanAgent;
    let (mut widget, _connector, _links, mut link) = open_widget(config).await;
    with_timeout(widget.next_event()).await.unwrap(); // StateChanged(Connected)
    link.drain_sent();

    // Automated-style inference stays off: a send leaves the indicator idle
    // and produces no typing event.
    widget.send("Is anyone there?").await.unwrap();
    assert_eq!(widget.typing_state(), TypingState::Idle);

    widget.agent_typing(true);
    assert_eq!(widget.typing_state(), TypingState::Waiting);
    assert_eq!(
        with_timeout(widget.next_event()).await.unwrap(),
        WidgetEvent::TypingChanged(TypingState::Waiting)
    );

    widget.agent_typing(false);
    assert_eq!(
        with_timeout(widget.next_event()).await.unwrap(),
        WidgetEvent::TypingChanged(TypingState::Idle)
    );
    assert_eq!(widget.typing_state(), TypingState::Idle);
}

/// A welcome message seeds the transcript before anything is sent.
#[tokio::test]
async fn test_welcome_message_seeds_transcript() {
    let mut config = test_config(ProtocolDialect::Broadcast);
    config.welcome_message = Some("Hi! How can we help?".to_string());

    let (connector, _links) = TestConnector::new();
    let widget = with_timeout(ChatWidget::open(config, Arc::new(connector), None, None))
        .await
        .unwrap();

    let transcript = widget.transcript();
    assert_eq!(transcript.len(), 1);
    assert_eq!(transcript[0].id.as_str(), "welcome");
    assert_eq!(transcript[0].sender_kind, SenderKind::Ai);
}

/// Teardown close discards everything; detach close returns the session
/// for a later reopen.
#[tokio::test]
async fn test_close_behaviors() {
    // Teardown.
    let (mut widget, _c1, _l1, link) =
        open_widget(test_config(ProtocolDialect::Broadcast)).await;
    with_timeout(widget.next_event()).await.unwrap();
    widget.send("bye").await.unwrap();
    assert!(widget.close().await.is_none());
    // The broker side sees the transport go away.
    assert!(link.to_client.is_closed());

    // Detach keeps the session identity.
    let mut config = test_config(ProtocolDialect::Broadcast);
    config.close_behavior = CloseBehavior::Detach;
    let (connector, _links) = TestConnector::new();
    let connector = Arc::new(connector);
    let widget = with_timeout(ChatWidget::open(
        config.clone(),
        connector.clone(),
        None,
        None,
    ))
    .await
    .unwrap();
    let session_id = widget.session().session_id.clone();
    let session = widget.close().await.expect("detached session");
    assert_eq!(session.session_id, session_id);

    // Reopen resumes with the same identity.
    let widget = with_timeout(ChatWidget::reopen(config, connector, None, session))
        .await
        .unwrap();
    assert_eq!(widget.session().session_id, session_id);
}
