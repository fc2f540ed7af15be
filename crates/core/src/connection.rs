//! Connection lifecycle and automatic reconnection.
//!
//! One [`ConnectionManager`] per widget activation. It owns the transport,
//! runs bounded retry cycles with backoff, and distinguishes the initial
//! connect (`Connecting`) from recovery after a drop (`Reconnecting`).
//! Closing cancels any in-flight attempt or backoff sleep.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::ReconnectPolicy;
use crate::error::{Error, Result};
use crate::protocol::Frame;
use crate::transport::{Connector, Transport};
use crate::types::ConnectionState;

/// Manages the broker connection for one session.
pub struct ConnectionManager {
    connector: Arc<dyn Connector>,
    endpoint: String,
    policy: ReconnectPolicy,
    session_id: String,
    state: ConnectionState,
    transport: Option<Box<dyn Transport>>,
    cancel: CancellationToken,
}

impl ConnectionManager {
    /// Create a manager in the `Disconnected` state.
    pub fn new(
        connector: Arc<dyn Connector>,
        endpoint: impl Into<String>,
        policy: ReconnectPolicy,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            connector,
            endpoint: endpoint.into(),
            policy,
            session_id: session_id.into(),
            state: ConnectionState::Disconnected,
            transport: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Whether sends are currently allowed.
    pub fn is_connected(&self) -> bool {
        self.state.can_send()
    }

    /// Token cancelled when the connection is closed.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Establish the connection, retrying per policy.
    ///
    /// No-op when already connected; an error when an attempt cycle is
    /// already in flight. Callable again from `Failed` as the explicit
    /// manual retry.
    pub async fn connect(&mut self) -> Result<()> {
        match self.state {
            ConnectionState::Connected => return Ok(()),
            ConnectionState::Connecting | ConnectionState::Reconnecting => {
                return Err(Error::Connection(
                    "connection attempt already in flight".to_string(),
                ))
            }
            ConnectionState::Disconnected | ConnectionState::Failed => {}
        }
        // A previous close consumed the token; start fresh.
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
        self.run_attempts(ConnectionState::Connecting).await
    }

    /// Recover after a dropped connection, retrying per policy.
    pub async fn reconnect(&mut self) -> Result<()> {
        self.transport = None;
        self.run_attempts(ConnectionState::Reconnecting).await
    }

    async fn run_attempts(&mut self, phase: ConnectionState) -> Result<()> {
        self.state = phase;
        let mut failures: u32 = 0;

        loop {
            let cancel = self.cancel.clone();
            let attempt = tokio::select! {
                _ = cancel.cancelled() => {
                    self.state = ConnectionState::Disconnected;
                    return Err(Error::Cancelled);
                }
                result = self.try_once() => result,
            };

            match attempt {
                Ok(transport) => {
                    self.transport = Some(transport);
                    self.state = ConnectionState::Connected;
                    info!("Connected to {} ({})", self.endpoint, phase.as_str());
                    return Ok(());
                }
                Err(e) => {
                    failures += 1;
                    warn!(
                        "Connection attempt {}/{} failed: {}",
                        failures, self.policy.max_attempts, e
                    );
                    if failures >= self.policy.max_attempts {
                        self.state = ConnectionState::Failed;
                        return Err(Error::RetriesExhausted { attempts: failures });
                    }
                }
            }

            let delay = self.policy.delay_for(failures);
            debug!("Retrying in {:?}", delay);
            tokio::select! {
                _ = cancel.cancelled() => {
                    self.state = ConnectionState::Disconnected;
                    return Err(Error::Cancelled);
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// One connection attempt: dial and send the handshake frame.
    async fn try_once(&self) -> Result<Box<dyn Transport>> {
        let mut transport = self.connector.connect(&self.endpoint).await?;
        transport
            .send(&Frame::Connect {
                session_id: self.session_id.clone(),
            })
            .await?;
        Ok(transport)
    }

    /// Send a frame over the established connection.
    pub async fn send(&mut self, frame: &Frame) -> Result<()> {
        if !self.state.can_send() {
            return Err(Error::NotConnected);
        }
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;
        transport.send(frame).await
    }

    /// Receive the next frame, or `Ok(None)` when the peer closes cleanly.
    pub async fn recv(&mut self) -> Result<Option<Frame>> {
        let cancel = self.cancel.clone();
        let transport = self.transport.as_mut().ok_or(Error::NotConnected)?;
        tokio::select! {
            _ = cancel.cancelled() => Err(Error::Cancelled),
            result = transport.recv() => result,
        }
    }

    /// Close the connection, cancelling any in-flight attempt or backoff.
    pub async fn close(&mut self) {
        self.cancel.cancel();
        if let Some(mut transport) = self.transport.take() {
            if let Err(e) = transport.close().await {
                debug!("Error closing transport: {}", e);
            }
        }
        self.state = ConnectionState::Disconnected;
    }
}
