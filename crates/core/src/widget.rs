//! The chat widget: one activation of the support-chat client.
//!
//! Owns the session identity, connection, subscription router, transcript,
//! and typing indicator, and exposes them through a single event loop.
//! Callers drive the widget by alternating [`ChatWidget::send`] and
//! [`ChatWidget::next_event`].

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::api::RoomApi;
use crate::composer::MessageComposer;
use crate::config::{ChatConfig, CloseBehavior, ResponderMode};
use crate::connection::ConnectionManager;
use crate::dialect::InboundEvent;
use crate::error::{Error, Result};
use crate::protocol::Frame;
use crate::router::SubscriptionRouter;
use crate::session::{short_token, ChatSession, UserProfile};
use crate::store::MessageStore;
use crate::transport::Connector;
use crate::types::{ChatMessage, ConnectionState, MessageId, SenderKind, TypingState};
use crate::typing::TypingIndicatorController;

/// Observable widget activity, delivered in order by
/// [`ChatWidget::next_event`].
#[derive(Debug, Clone, PartialEq)]
pub enum WidgetEvent {
    /// A message was appended to the transcript.
    Message(ChatMessage),
    /// The typing indicator changed.
    TypingChanged(TypingState),
    /// The connection state changed.
    StateChanged(ConnectionState),
    /// The widget was closed.
    Closed,
}

/// Lock a mutex, recovering the guard if a panicking holder poisoned it.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

enum Step {
    Frame(Result<Option<Frame>>),
    TypingDeadline,
}

/// One activation of the support-chat client.
pub struct ChatWidget {
    config: ChatConfig,
    session: ChatSession,
    conn: ConnectionManager,
    router: SubscriptionRouter,
    composer: MessageComposer,
    store: Arc<Mutex<MessageStore>>,
    typing: Arc<Mutex<TypingIndicatorController>>,
    pending: Arc<Mutex<VecDeque<WidgetEvent>>>,
}

impl ChatWidget {
    /// Open a widget with a freshly resolved session identity.
    pub async fn open(
        config: ChatConfig,
        connector: Arc<dyn Connector>,
        api: Option<Arc<dyn RoomApi>>,
        profile: Option<UserProfile>,
    ) -> Result<Self> {
        let session = ChatSession::resolve(profile);
        Self::start(config, connector, api, session).await
    }

    /// Open a widget resuming a previously detached session.
    pub async fn reopen(
        config: ChatConfig,
        connector: Arc<dyn Connector>,
        api: Option<Arc<dyn RoomApi>>,
        session: ChatSession,
    ) -> Result<Self> {
        Self::start(config, connector, api, session).await
    }

    async fn start(
        config: ChatConfig,
        connector: Arc<dyn Connector>,
        api: Option<Arc<dyn RoomApi>>,
        mut session: ChatSession,
    ) -> Result<Self> {
        if config.dialect.requires_room() && session.room_id.is_none() {
            session.room_id = Some(Self::provision_room(api.as_deref(), &session).await);
        }

        let mut store = MessageStore::new();
        if let (Some(api), Some(room_id)) = (api.as_deref(), session.room_id.as_deref()) {
            Self::replay_history(api, &config, &session, room_id, &mut store).await;
        }
        if let Some(text) = &config.welcome_message {
            store.append(ChatMessage {
                id: MessageId::from("welcome"),
                content: text.clone(),
                sender_kind: SenderKind::Ai,
                sender_name: SenderKind::Ai.as_str().to_string(),
                sent_at: Utc::now(),
                sequence: 0,
            });
        }

        let conn = ConnectionManager::new(
            connector,
            config.endpoint.clone(),
            config.reconnect.clone(),
            session.session_id.clone(),
        );
        let composer = MessageComposer::new(session.clone(), config.dialect);
        let router = SubscriptionRouter::new(config.dialect, session.clone());
        let typing = TypingIndicatorController::new(config.typing_timeout());

        let mut widget = Self {
            config,
            session,
            conn,
            router,
            composer,
            store: Arc::new(Mutex::new(store)),
            typing: Arc::new(Mutex::new(typing)),
            pending: Arc::new(Mutex::new(VecDeque::new())),
        };

        widget.install_subscription()?;
        widget.conn.connect().await?;
        widget.push(WidgetEvent::StateChanged(ConnectionState::Connected));
        widget.router.activate(&mut widget.conn).await?;
        info!("Chat widget opened, session {}", widget.session.session_id);
        Ok(widget)
    }

    /// Provision a room via the API, falling back to a locally generated id
    /// so the widget still opens when the REST surface is down.
    async fn provision_room(api: Option<&dyn RoomApi>, session: &ChatSession) -> String {
        match api {
            Some(api) => match api.create_room(&session.user_id).await {
                Ok(room_id) => room_id,
                Err(e) => {
                    warn!("Room provisioning failed, using local room id: {}", e);
                    format!("room_{}", short_token())
                }
            },
            None => format!("room_{}", short_token()),
        }
    }

    /// Load the stored transcript for a resumed room, oldest first. A fetch
    /// failure just means starting from an empty transcript.
    async fn replay_history(
        api: &dyn RoomApi,
        config: &ChatConfig,
        session: &ChatSession,
        room_id: &str,
        store: &mut MessageStore,
    ) {
        let raw = match api.get_history(room_id).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!("History fetch failed, starting empty: {}", e);
                return;
            }
        };
        for value in raw {
            match config.dialect.decode_inbound(session, &value) {
                Ok(InboundEvent::ChatText(msg)) => {
                    store.append(msg);
                }
                Ok(_) => {}
                Err(e) => warn!("Skipping malformed history entry: {}", e),
            }
        }
    }

    /// Register the inbound handler for this session's destination.
    fn install_subscription(&mut self) -> Result<()> {
        let destination = self.config.dialect.subscribe_destination(&self.session)?;
        let store = self.store.clone();
        let typing = self.typing.clone();
        let pending = self.pending.clone();

        self.router.subscribe(
            destination,
            Box::new(move |event| match event {
                InboundEvent::ChatText(msg) => {
                    // The responder replied; the indicator comes down even
                    // if the message turns out to be a redelivery.
                    if msg.sender_kind == SenderKind::Ai && lock(&typing).acknowledge_response()
                    {
                        lock(&pending)
                            .push_back(WidgetEvent::TypingChanged(TypingState::Idle));
                    }
                    let mut store = lock(&store);
                    if store.append(msg) {
                        if let Some(stored) = store.messages().last() {
                            lock(&pending).push_back(WidgetEvent::Message(stored.clone()));
                        }
                    }
                }
                InboundEvent::Join { sender_name } => {
                    let notice = ChatMessage::system(format!(
                        "{sender_name} joined the conversation"
                    ));
                    let mut store = lock(&store);
                    if store.append(notice) {
                        if let Some(stored) = store.messages().last() {
                            lock(&pending).push_back(WidgetEvent::Message(stored.clone()));
                        }
                    }
                }
                InboundEvent::SystemNotice { content } => {
                    let notice = ChatMessage::system(content);
                    let mut store = lock(&store);
                    if store.append(notice) {
                        if let Some(stored) = store.messages().last() {
                            lock(&pending).push_back(WidgetEvent::Message(stored.clone()));
                        }
                    }
                }
            }),
        );
        Ok(())
    }

    /// Validate and send a message, echoing it into the transcript and
    /// raising the typing indicator in automated mode.
    pub async fn send(&mut self, content: &str) -> Result<ChatMessage> {
        let msg = self.composer.send(&mut self.conn, content).await?;
        if self.config.optimistic_echo {
            lock(&self.store).append(msg.clone());
        }
        if self.config.responder == ResponderMode::Automated {
            lock(&self.typing).begin_waiting();
            self.push(WidgetEvent::TypingChanged(TypingState::Waiting));
        }
        Ok(msg)
    }

    /// Apply an explicit agent-typing signal (human-agent deployments).
    pub fn agent_typing(&mut self, typing: bool) {
        if lock(&self.typing).set_external(typing) {
            let state = lock(&self.typing).state();
            self.push(WidgetEvent::TypingChanged(state));
        }
    }

    /// Wait for the next observable event.
    ///
    /// Drives the connection: inbound frames are dispatched, drops trigger
    /// the automatic reconnect cycle, and the typing stale timeout fires
    /// here. Returns `Err(NotConnected)` once the connection has failed and
    /// only [`ChatWidget::retry`] can continue.
    pub async fn next_event(&mut self) -> Result<WidgetEvent> {
        loop {
            if let Some(event) = lock(&self.pending).pop_front() {
                return Ok(event);
            }
            if !self.conn.is_connected() {
                return Err(Error::NotConnected);
            }

            let deadline = lock(&self.typing).deadline();
            let step = tokio::select! {
                result = self.conn.recv() => Step::Frame(result),
                _ = tokio::time::sleep_until(deadline.unwrap_or_else(Instant::now)),
                    if deadline.is_some() => Step::TypingDeadline,
            };

            match step {
                Step::Frame(Ok(Some(frame))) => self.router.dispatch(&frame),
                Step::Frame(Ok(None)) => self.handle_drop().await,
                Step::Frame(Err(Error::Cancelled)) => return Ok(WidgetEvent::Closed),
                Step::Frame(Err(e)) => {
                    debug!("Transport error: {}", e);
                    self.handle_drop().await;
                }
                Step::TypingDeadline => {
                    if lock(&self.typing).expire_if_due(Instant::now()) {
                        self.push(WidgetEvent::TypingChanged(TypingState::Idle));
                    }
                }
            }
        }
    }

    /// Run the automatic reconnect cycle after a dropped connection.
    async fn handle_drop(&mut self) {
        self.push(WidgetEvent::StateChanged(ConnectionState::Reconnecting));
        match self.conn.reconnect().await {
            Ok(()) => {
                if let Err(e) = self.router.activate(&mut self.conn).await {
                    warn!("Failed to replay subscriptions: {}", e);
                }
                self.push(WidgetEvent::StateChanged(ConnectionState::Connected));
            }
            Err(Error::Cancelled) => self.push(WidgetEvent::Closed),
            Err(e) => {
                warn!("Reconnect failed: {}", e);
                self.push(WidgetEvent::StateChanged(ConnectionState::Failed));
            }
        }
    }

    /// Manually retry after automatic reconnection gave up.
    pub async fn retry(&mut self) -> Result<()> {
        self.conn.connect().await?;
        self.router.activate(&mut self.conn).await?;
        self.push(WidgetEvent::StateChanged(ConnectionState::Connected));
        Ok(())
    }

    /// Close the widget.
    ///
    /// With [`CloseBehavior::Detach`] the session identity is returned so a
    /// later [`ChatWidget::reopen`] resumes the conversation; with
    /// [`CloseBehavior::Teardown`] everything is discarded.
    pub async fn close(mut self) -> Option<ChatSession> {
        self.conn.close().await;
        self.router.clear();
        match self.config.close_behavior {
            CloseBehavior::Teardown => {
                lock(&self.store).clear();
                None
            }
            CloseBehavior::Detach => Some(self.session),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.conn.state()
    }

    /// Current typing indicator state.
    pub fn typing_state(&self) -> TypingState {
        lock(&self.typing).state()
    }

    /// This activation's session identity.
    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Snapshot of the transcript, in order.
    pub fn transcript(&self) -> Vec<ChatMessage> {
        lock(&self.store).messages().to_vec()
    }

    /// Shared handle to the message store.
    pub fn store(&self) -> Arc<Mutex<MessageStore>> {
        self.store.clone()
    }

    fn push(&self, event: WidgetEvent) {
        lock(&self.pending).push_back(event);
    }
}
