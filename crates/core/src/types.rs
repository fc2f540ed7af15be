//! Core data types for the chat subsystem.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::session::ChatSession;

/// Unique identifier for a chat message.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub String);

impl MessageId {
    /// Create a new random message ID.
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the ID as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SenderKind {
    /// The local user of the widget.
    User,
    /// A human support agent.
    Agent,
    /// The automated responder.
    Ai,
    /// Synthetic notices (joins, announcements).
    System,
}

impl SenderKind {
    /// Wire/display label for this sender kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            SenderKind::User => "USER",
            SenderKind::Agent => "AGENT",
            SenderKind::Ai => "AI",
            SenderKind::System => "SYSTEM",
        }
    }

    /// True for any sender other than the local user.
    pub fn is_remote(&self) -> bool {
        !matches!(self, SenderKind::User)
    }
}

/// A single chat message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique message identifier.
    pub id: MessageId,
    /// Message content (plain text).
    pub content: String,
    /// Who sent the message.
    pub sender_kind: SenderKind,
    /// Display name of the sender.
    pub sender_name: String,
    /// When the message was created/sent (UTC).
    pub sent_at: DateTime<Utc>,
    /// Position within the session transcript. Zero until assigned by
    /// whichever side first observes the message.
    pub sequence: u64,
}

impl ChatMessage {
    /// Maximum allowed content length (10KB).
    pub const MAX_CONTENT_LENGTH: usize = 10 * 1024;

    /// Create a new outgoing message stamped with the session identity.
    pub fn new_outgoing(session: &ChatSession, content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            content: content.into(),
            sender_kind: SenderKind::User,
            sender_name: session.display_name.clone(),
            sent_at: Utc::now(),
            sequence: 0,
        }
    }

    /// Create a synthetic system message (joins, notices).
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            content: content.into(),
            sender_kind: SenderKind::System,
            sender_name: SenderKind::System.as_str().to_string(),
            sent_at: Utc::now(),
            sequence: 0,
        }
    }
}

/// State of the broker connection. Exactly one instance per widget
/// activation; never shared across sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// No connection and no attempt in flight.
    Disconnected,
    /// Initial handshake cycle in progress.
    Connecting,
    /// Connected and able to send.
    Connected,
    /// Connection dropped; automatic retry cycle in progress.
    Reconnecting,
    /// Automatic attempts exhausted; only an explicit retry continues.
    Failed,
}

impl ConnectionState {
    /// Get a human-readable string for this state.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
            ConnectionState::Failed => "failed",
        }
    }

    /// Check whether sends are allowed in this state.
    pub fn can_send(&self) -> bool {
        matches!(self, ConnectionState::Connected)
    }
}

/// Whether the widget is waiting for a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypingState {
    /// Nothing pending.
    #[default]
    Idle,
    /// A response is expected; the UI shows the typing indicator.
    Waiting,
}
