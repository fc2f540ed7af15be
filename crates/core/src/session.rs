//! Session identity resolution.
//!
//! The identity used to tag outbound messages is an explicit value object
//! passed into the widget, never read from ambient storage. It comes either
//! from an authenticated user profile or is generated locally for anonymous
//! use.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of one widget activation.
///
/// Immutable for the session's lifetime apart from room provisioning, which
/// fills `room_id` before the connection is opened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatSession {
    /// Unique id for this activation.
    pub session_id: String,
    /// Stable id of the user within the session.
    pub user_id: String,
    /// Chat room, if this deployment is room-based.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    /// Name shown next to outbound messages.
    pub display_name: String,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
}

/// Authenticated user context supplied by the surrounding application.
#[derive(Debug, Clone, PartialEq)]
pub struct UserProfile {
    pub user_id: String,
    pub display_name: String,
}

impl ChatSession {
    /// Resolve a session identity: derive from the supplied profile when
    /// present, otherwise generate a locally-unique anonymous identity.
    pub fn resolve(profile: Option<UserProfile>) -> Self {
        match profile {
            Some(profile) => Self::from_profile(profile),
            None => Self::anonymous(),
        }
    }

    /// Build a session for an authenticated user.
    pub fn from_profile(profile: UserProfile) -> Self {
        Self {
            session_id: new_session_id(),
            user_id: profile.user_id,
            room_id: None,
            display_name: profile.display_name,
            created_at: Utc::now(),
        }
    }

    /// Build an anonymous session with generated ids.
    pub fn anonymous() -> Self {
        Self {
            session_id: new_session_id(),
            user_id: format!("user_{}", short_token()),
            room_id: None,
            display_name: "Guest".to_string(),
            created_at: Utc::now(),
        }
    }

    /// Attach a provisioned room id.
    pub fn with_room(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }
}

/// Time-derived session id with a random suffix so two activations in the
/// same millisecond cannot collide.
fn new_session_id() -> String {
    format!("session_{}_{}", Utc::now().timestamp_millis(), short_token())
}

/// Short random token in the style of the anonymous user ids.
pub(crate) fn short_token() -> String {
    let id = uuid::Uuid::new_v4().simple().to_string();
    id[..9].to_string()
}
