//! REST collaborators for room-based deployments.
//!
//! Room provisioning and history retrieval go over plain HTTP before the
//! broker connection opens. History is returned as raw wire payloads so the
//! caller can funnel them through the same dialect decoding as live traffic.

use async_trait::async_trait;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Backend REST surface for rooms.
#[async_trait]
pub trait RoomApi: Send + Sync {
    /// Provision a chat room for the given user, returning its id.
    async fn create_room(&self, user_id: &str) -> Result<String>;

    /// Fetch the stored transcript for a room, oldest first, as raw wire
    /// payloads.
    async fn get_history(&self, room_id: &str) -> Result<Vec<serde_json::Value>>;
}

#[derive(Debug, Deserialize)]
struct CreateRoomResponse {
    #[serde(rename = "roomId")]
    room_id: String,
}

/// HTTP implementation of [`RoomApi`].
pub struct HttpRoomApi {
    base_url: String,
    client: reqwest::Client,
}

impl HttpRoomApi {
    /// Create a client for the given API base URL.
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl RoomApi for HttpRoomApi {
    async fn create_room(&self, user_id: &str) -> Result<String> {
        let url = format!("{}/chat/room/create?userId={}", self.base_url, user_id);
        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| Error::Api(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Api(e.to_string()))?;
        let body: CreateRoomResponse = response
            .json()
            .await
            .map_err(|e| Error::Api(e.to_string()))?;
        Ok(body.room_id)
    }

    async fn get_history(&self, room_id: &str) -> Result<Vec<serde_json::Value>> {
        let url = format!("{}/chat/room/{}/messages", self.base_url, room_id);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::Api(e.to_string()))?
            .error_for_status()
            .map_err(|e| Error::Api(e.to_string()))?;
        response
            .json()
            .await
            .map_err(|e| Error::Api(e.to_string()))
    }
}
