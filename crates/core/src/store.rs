//! In-memory session transcript.
//!
//! The transcript is ephemeral: it lives exactly as long as the widget and
//! survives reconnects, but is discarded on teardown. Messages are kept in
//! arrival order with monotonically increasing sequence numbers, and
//! duplicate ids (broker echo plus optimistic append, redeliveries after a
//! reconnect) are dropped.

use std::collections::HashSet;

use crate::types::{ChatMessage, MessageId};

/// Ordered, deduplicated message transcript for one session.
#[derive(Debug, Default)]
pub struct MessageStore {
    messages: Vec<ChatMessage>,
    seen: HashSet<MessageId>,
    next_sequence: u64,
}

impl MessageStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            messages: Vec::new(),
            seen: HashSet::new(),
            next_sequence: 1,
        }
    }

    /// Append a message, assigning its sequence number.
    ///
    /// Returns `false` if a message with the same id is already present;
    /// the duplicate is dropped without disturbing the transcript.
    pub fn append(&mut self, mut msg: ChatMessage) -> bool {
        if self.seen.contains(&msg.id) {
            return false;
        }
        if msg.sequence == 0 {
            msg.sequence = self.next_sequence;
        }
        self.next_sequence = self.next_sequence.max(msg.sequence) + 1;
        self.seen.insert(msg.id.clone());
        self.messages.push(msg);
        true
    }

    /// Number of messages in the transcript.
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether the transcript is empty.
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Iterate the transcript in order. Restartable; iterating does not
    /// consume anything.
    pub fn iter(&self) -> impl Iterator<Item = &ChatMessage> {
        self.messages.iter()
    }

    /// The transcript as a slice, in order.
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    /// Discard everything. Only called on session teardown.
    pub fn clear(&mut self) {
        self.messages.clear();
        self.seen.clear();
        self.next_sequence = 1;
    }
}
