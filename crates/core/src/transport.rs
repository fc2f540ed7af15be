//! Broker transport abstraction and the WebSocket implementation.
//!
//! The connection manager and widget only see the [`Transport`] and
//! [`Connector`] traits; tests drive them with in-memory channel transports
//! while production uses [`WsConnector`].

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::warn;
use url::Url;

use crate::error::{Error, Result};
use crate::protocol::Frame;

/// An established, bidirectional frame stream to the broker.
#[async_trait]
pub trait Transport: Send {
    /// Send one frame.
    async fn send(&mut self, frame: &Frame) -> Result<()>;

    /// Receive the next frame. `Ok(None)` means the peer closed cleanly.
    async fn recv(&mut self) -> Result<Option<Frame>>;

    /// Close the transport.
    async fn close(&mut self) -> Result<()>;
}

/// Factory for transports; one `connect` call per connection attempt.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Open a new transport to the given endpoint.
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Transport>>;
}

/// WebSocket transport carrying JSON-encoded frames as text messages.
pub struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, frame: &Frame) -> Result<()> {
        let text = frame.to_json()?;
        self.stream
            .send(Message::Text(text))
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }

    async fn recv(&mut self) -> Result<Option<Frame>> {
        loop {
            let msg = match self.stream.next().await {
                Some(Ok(msg)) => msg,
                Some(Err(e)) => return Err(Error::Transport(e.to_string())),
                None => return Ok(None),
            };
            match msg {
                Message::Text(text) => match Frame::from_json(&text) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(e) => {
                        // A malformed frame is dropped, not fatal.
                        warn!("Dropping malformed frame: {}", e);
                        continue;
                    }
                },
                Message::Binary(bytes) => match Frame::from_slice(&bytes) {
                    Ok(frame) => return Ok(Some(frame)),
                    Err(e) => {
                        warn!("Dropping malformed frame: {}", e);
                        continue;
                    }
                },
                Message::Close(_) => return Ok(None),
                // Ping/pong are handled by the library.
                _ => continue,
            }
        }
    }

    async fn close(&mut self) -> Result<()> {
        self.stream
            .close(None)
            .await
            .map_err(|e| Error::Transport(e.to_string()))
    }
}

/// Production connector dialing the configured WebSocket endpoint.
#[derive(Debug, Default)]
pub struct WsConnector;

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self, endpoint: &str) -> Result<Box<dyn Transport>> {
        let url = Url::parse(endpoint)
            .map_err(|e| Error::Config(format!("invalid endpoint {endpoint:?}: {e}")))?;
        let (stream, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| Error::Connection(e.to_string()))?;
        Ok(Box::new(WsTransport { stream }))
    }
}
