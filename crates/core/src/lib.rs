//! Core library for the embeddable support-chat client.
//!
//! Provides session identity, broker connection management with automatic
//! reconnection, subscription routing, an in-memory transcript, outbound
//! message composition, and typing-indicator tracking, tied together by
//! [`ChatWidget`].

pub mod api;
pub mod composer;
pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod protocol;
pub mod router;
pub mod session;
pub mod store;
pub mod transport;
pub mod types;
pub mod typing;
pub mod widget;

pub use api::{HttpRoomApi, RoomApi};
pub use composer::MessageComposer;
pub use config::{ChatConfig, CloseBehavior, ReconnectPolicy, ResponderMode};
pub use connection::ConnectionManager;
pub use dialect::{InboundEvent, ProtocolDialect};
pub use error::{Error, Result};
pub use protocol::Frame;
pub use router::SubscriptionRouter;
pub use session::{ChatSession, UserProfile};
pub use store::MessageStore;
pub use transport::{Connector, Transport, WsConnector};
pub use types::{ChatMessage, ConnectionState, MessageId, SenderKind, TypingState};
pub use typing::TypingIndicatorController;
pub use widget::{ChatWidget, WidgetEvent};
