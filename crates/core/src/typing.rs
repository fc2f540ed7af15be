//! Typing indicator state.
//!
//! In automated mode the indicator is inferred locally: it turns on when the
//! user sends and off when the responder's reply arrives, with a stale
//! timeout in case the reply never comes. In human-agent mode it follows
//! explicit external signals instead.

use std::time::Duration;

use tokio::time::Instant;

use crate::types::TypingState;

/// Tracks whether the widget is waiting for a response.
#[derive(Debug)]
pub struct TypingIndicatorController {
    state: TypingState,
    timeout: Duration,
    deadline: Option<Instant>,
}

impl TypingIndicatorController {
    /// Create a controller with the given stale timeout.
    pub fn new(timeout: Duration) -> Self {
        Self {
            state: TypingState::Idle,
            timeout,
            deadline: None,
        }
    }

    /// Current indicator state.
    pub fn state(&self) -> TypingState {
        self.state
    }

    /// When the indicator goes stale, if it is on.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// The user sent a message; start waiting for the reply.
    pub fn begin_waiting(&mut self) {
        self.state = TypingState::Waiting;
        self.deadline = Some(Instant::now() + self.timeout);
    }

    /// A response arrived. Returns `true` if the indicator turned off.
    pub fn acknowledge_response(&mut self) -> bool {
        if self.state == TypingState::Waiting {
            self.state = TypingState::Idle;
            self.deadline = None;
            true
        } else {
            false
        }
    }

    /// Turn the indicator off if its deadline has passed. Returns `true`
    /// if it was on and went stale.
    pub fn expire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.state = TypingState::Idle;
                self.deadline = None;
                true
            }
            _ => false,
        }
    }

    /// Apply an explicit external typing signal (human-agent mode).
    /// Returns `true` if the state changed.
    pub fn set_external(&mut self, typing: bool) -> bool {
        let next = if typing {
            TypingState::Waiting
        } else {
            TypingState::Idle
        };
        if next == self.state {
            return false;
        }
        self.state = next;
        self.deadline = if typing {
            Some(Instant::now() + self.timeout)
        } else {
            None
        };
        true
    }
}
