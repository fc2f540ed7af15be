//! Widget configuration and the reconnect policy.

use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::dialect::ProtocolDialect;

/// Bounded exponential backoff with jitter for reconnect attempts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconnectPolicy {
    /// Consecutive failures tolerated before the connection is marked failed.
    pub max_attempts: u32,
    /// Delay before the second attempt, in milliseconds.
    pub base_delay_ms: u64,
    /// Ceiling on any single delay, in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay_ms: 1000,
            max_delay_ms: 30_000,
        }
    }
}

impl ReconnectPolicy {
    /// Delay to wait after the given number of consecutive failures.
    ///
    /// Grows as `base * 2^(failures-1)` capped at `max_delay_ms`, then up to
    /// 25% additive jitter on top. The jitter is applied after the cap so
    /// clients that have all reached the ceiling still spread out.
    pub fn delay_for(&self, failures: u32) -> Duration {
        let exp = failures.saturating_sub(1).min(20);
        let raw = self.base_delay_ms.saturating_mul(1u64 << exp);
        let capped = raw.min(self.max_delay_ms);
        let jitter = (capped as f64 * rand::thread_rng().gen_range(0.0..=0.25)) as u64;
        Duration::from_millis(capped + jitter)
    }
}

/// Who answers on the other end of the conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponderMode {
    /// An automated agent replies to every message; the typing indicator is
    /// driven locally (set on send, cleared on the reply).
    Automated,
    /// A human agent replies when available; typing state comes from
    /// explicit signals.
    HumanAgent,
}

/// What happens to session state when the widget closes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseBehavior {
    /// Discard the transcript and session identity.
    Teardown,
    /// Keep the session identity so a later open resumes the conversation.
    Detach,
}

/// Configuration for a chat widget instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Broker endpoint URL (`ws://` or `wss://`).
    pub endpoint: String,
    /// Which wire payload schema the backend speaks.
    pub dialect: ProtocolDialect,
    /// Who answers the conversation.
    pub responder: ResponderMode,
    /// Session teardown policy on close.
    pub close_behavior: CloseBehavior,
    /// Reconnect backoff policy.
    pub reconnect: ReconnectPolicy,
    /// How long the typing indicator may stay on without a reply, in
    /// milliseconds.
    pub typing_timeout_ms: u64,
    /// Append outgoing messages locally instead of waiting for the broker
    /// echo.
    pub optimistic_echo: bool,
    /// Optional greeting appended to a fresh transcript before connecting.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub welcome_message: Option<String>,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            endpoint: "ws://localhost:8080/ws".to_string(),
            dialect: ProtocolDialect::Broadcast,
            responder: ResponderMode::Automated,
            close_behavior: CloseBehavior::Teardown,
            reconnect: ReconnectPolicy::default(),
            typing_timeout_ms: 15_000,
            optimistic_echo: true,
            welcome_message: None,
        }
    }
}

impl ChatConfig {
    /// Typing indicator stale timeout as a [`Duration`].
    pub fn typing_timeout(&self) -> Duration {
        Duration::from_millis(self.typing_timeout_ms)
    }

    /// Defaults with environment variable overrides applied.
    ///
    /// Recognized variables: `CHATKIT_ENDPOINT`,
    /// `CHATKIT_MAX_RECONNECT_ATTEMPTS`.
    pub fn load_with_env() -> Self {
        let mut config = Self::default();
        if let Ok(endpoint) = std::env::var("CHATKIT_ENDPOINT") {
            config.endpoint = endpoint;
        }
        if let Ok(attempts) = std::env::var("CHATKIT_MAX_RECONNECT_ATTEMPTS") {
            if let Ok(attempts) = attempts.parse() {
                config.reconnect.max_attempts = attempts;
            }
        }
        config
    }
}
