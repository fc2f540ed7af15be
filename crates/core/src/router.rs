//! Subscription registry and inbound dispatch.
//!
//! Subscriptions are plain state in this registry; the broker only learns
//! about them when [`SubscriptionRouter::activate`] replays them over a
//! connected transport. That replay runs on every transition to connected,
//! initial or after a reconnect, so a fresh transport always carries the
//! full subscription set exactly once.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::connection::ConnectionManager;
use crate::dialect::{InboundEvent, ProtocolDialect};
use crate::error::Result;
use crate::protocol::Frame;
use crate::session::ChatSession;

/// Handler invoked for each decoded inbound event on a destination.
pub type EventHandler = Box<dyn FnMut(InboundEvent) + Send>;

/// Routes inbound broker frames to per-destination handlers.
pub struct SubscriptionRouter {
    dialect: ProtocolDialect,
    session: ChatSession,
    handlers: HashMap<String, EventHandler>,
}

impl SubscriptionRouter {
    /// Create an empty router for the given dialect and session.
    pub fn new(dialect: ProtocolDialect, session: ChatSession) -> Self {
        Self {
            dialect,
            session,
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for a destination. Registering the same
    /// destination again replaces the handler; the subscription itself is
    /// not duplicated.
    pub fn subscribe(&mut self, destination: impl Into<String>, handler: EventHandler) {
        self.handlers.insert(destination.into(), handler);
    }

    /// Remove a destination's subscription.
    pub fn unsubscribe(&mut self, destination: &str) {
        self.handlers.remove(destination);
    }

    /// Drop all subscriptions.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Registered destinations, in no particular order.
    pub fn destinations(&self) -> Vec<String> {
        self.handlers.keys().cloned().collect()
    }

    /// Replay every registered subscription over the connected transport.
    pub async fn activate(&mut self, conn: &mut ConnectionManager) -> Result<()> {
        for destination in self.handlers.keys() {
            conn.send(&Frame::Subscribe {
                destination: destination.clone(),
            })
            .await?;
        }
        Ok(())
    }

    /// Dispatch one inbound frame to its destination handler.
    ///
    /// Frames for unknown destinations and payloads that fail to decode are
    /// dropped; a bad message never takes the session down.
    pub fn dispatch(&mut self, frame: &Frame) {
        let (destination, body) = match frame {
            Frame::Message { destination, body } => (destination, body),
            _ => return,
        };
        if !self.handlers.contains_key(destination) {
            debug!("Ignoring message for unknown destination {}", destination);
            return;
        }
        let event = match self.dialect.decode_inbound(&self.session, body) {
            Ok(event) => event,
            Err(e) => {
                warn!("Dropping malformed payload on {}: {}", destination, e);
                return;
            }
        };
        if let Some(handler) = self.handlers.get_mut(destination) {
            handler(event);
        }
    }
}
