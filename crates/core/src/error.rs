//! Error types for the core library.

use thiserror::Error;

/// Main error type for the core library.
#[derive(Error, Debug)]
pub enum Error {
    /// Send attempted while the connection is not established.
    #[error("not connected")]
    NotConnected,

    /// Send attempted with blank or whitespace-only content.
    #[error("message content cannot be empty")]
    EmptyContent,

    /// Send attempted with content over the size cap.
    #[error("message content exceeds maximum length ({0} bytes)")]
    ContentTooLong(usize),

    /// Handshake or connection-level failure for a single attempt.
    #[error("connection error: {0}")]
    Connection(String),

    /// All automatic reconnect attempts were consumed.
    #[error("connection failed after {attempts} attempts")]
    RetriesExhausted { attempts: u32 },

    /// An operation was interrupted by closing the widget.
    #[error("cancelled by close")]
    Cancelled,

    /// Transport-level I/O error.
    #[error("transport error: {0}")]
    Transport(String),

    /// Malformed or unexpected wire data.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Session identity or room-provisioning error.
    #[error("session error: {0}")]
    Session(String),

    /// REST collaborator error (room provisioning, history fetch).
    #[error("api error: {0}")]
    Api(String),
}

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;
