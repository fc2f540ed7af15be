//! Outbound message validation and publishing.

use crate::connection::ConnectionManager;
use crate::dialect::ProtocolDialect;
use crate::error::{Error, Result};
use crate::protocol::Frame;
use crate::session::ChatSession;
use crate::types::ChatMessage;

/// Validates, stamps, and publishes outgoing messages.
pub struct MessageComposer {
    session: ChatSession,
    dialect: ProtocolDialect,
}

impl MessageComposer {
    /// Create a composer bound to a session identity and dialect.
    pub fn new(session: ChatSession, dialect: ProtocolDialect) -> Self {
        Self { session, dialect }
    }

    /// Validate and publish one message.
    ///
    /// Rejects blank and oversized content before touching the connection,
    /// and refuses to send while disconnected. Returns the stamped message
    /// so the caller can echo it locally.
    pub async fn send(
        &self,
        conn: &mut ConnectionManager,
        content: &str,
    ) -> Result<ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return Err(Error::EmptyContent);
        }
        if content.len() > ChatMessage::MAX_CONTENT_LENGTH {
            return Err(Error::ContentTooLong(content.len()));
        }
        if !conn.is_connected() {
            return Err(Error::NotConnected);
        }

        let msg = ChatMessage::new_outgoing(&self.session, content);
        let frame = Frame::Send {
            destination: self.dialect.send_destination(&self.session)?,
            body: self.dialect.encode_outbound(&self.session, &msg)?,
        };
        conn.send(&frame).await?;
        Ok(msg)
    }
}
