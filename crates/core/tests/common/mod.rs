//! Common test utilities for integration tests.
//!
//! Provides shared helpers plus an in-memory broker: a [`TestConnector`]
//! that hands out channel-backed transports and exposes the broker side of
//! each link so tests can observe outbound frames and inject inbound ones.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use chatkit_core::{Connector, Error, Frame, Result, Transport};

/// Default timeout for test operations.
pub const TEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Initialize test logging with appropriate filters.
///
/// Call this at the start of tests that need debug output.
/// Safe to call multiple times (subsequent calls are no-ops).
#[allow(dead_code)]
pub fn init_test_logging() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("chatkit_core=debug")),
        )
        .with_test_writer()
        .try_init();
}

/// Run an async operation with a timeout.
///
/// Returns the result if the operation completes within the timeout,
/// or panics with a timeout message if it doesn't.
#[allow(dead_code)]
pub async fn with_timeout<T, F>(fut: F) -> T
where
    F: std::future::Future<Output = T>,
{
    tokio::time::timeout(TEST_TIMEOUT, fut)
        .await
        .expect("Test operation timed out")
}

/// The broker side of one established transport.
pub struct BrokerLink {
    /// Frames sent here arrive at the client. Dropping this sender makes
    /// the client see a clean close.
    pub to_client: mpsc::UnboundedSender<Frame>,
    /// Frames the client has sent.
    pub from_client: mpsc::UnboundedReceiver<Frame>,
}

impl BrokerLink {
    /// Deliver a broker message payload to the client.
    #[allow(dead_code)]
    pub fn deliver(&self, destination: &str, body: serde_json::Value) {
        let _ = self.to_client.send(Frame::Message {
            destination: destination.to_string(),
            body,
        });
    }

    /// Drain every frame the client has sent so far.
    #[allow(dead_code)]
    pub fn drain_sent(&mut self) -> Vec<Frame> {
        let mut frames = Vec::new();
        while let Ok(frame) = self.from_client.try_recv() {
            frames.push(frame);
        }
        frames
    }
}

struct ChannelTransport {
    inbound: mpsc::UnboundedReceiver<Frame>,
    outbound: mpsc::UnboundedSender<Frame>,
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn send(&mut self, frame: &Frame) -> Result<()> {
        self.outbound
            .send(frame.clone())
            .map_err(|_| Error::Transport("broker side dropped".to_string()))
    }

    async fn recv(&mut self) -> Result<Option<Frame>> {
        Ok(self.inbound.recv().await)
    }

    async fn close(&mut self) -> Result<()> {
        self.inbound.close();
        Ok(())
    }
}

/// Connector backed by in-memory channels. Each successful `connect` pushes
/// a new [`BrokerLink`] onto `links`.
pub struct TestConnector {
    fail_first: AtomicU32,
    attempts: AtomicU32,
    refuse: AtomicBool,
    links: Mutex<mpsc::UnboundedSender<BrokerLink>>,
}

impl TestConnector {
    /// Build a connector and the receiver for its broker links.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<BrokerLink>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                fail_first: AtomicU32::new(0),
                attempts: AtomicU32::new(0),
                refuse: AtomicBool::new(false),
                links: Mutex::new(tx),
            },
            rx,
        )
    }

    /// Make the next `n` connection attempts fail.
    #[allow(dead_code)]
    pub fn fail_next(&self, n: u32) {
        self.fail_first
            .store(self.attempts.load(Ordering::SeqCst) + n, Ordering::SeqCst);
    }

    /// Refuse every future connection attempt.
    #[allow(dead_code)]
    pub fn refuse_future_connects(&self) {
        self.refuse.store(true, Ordering::SeqCst);
    }

    /// Accept connection attempts again.
    #[allow(dead_code)]
    pub fn allow_connects(&self) {
        self.refuse.store(false, Ordering::SeqCst);
        self.fail_first.store(0, Ordering::SeqCst);
    }

    /// Total connection attempts so far.
    #[allow(dead_code)]
    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connector for TestConnector {
    async fn connect(&self, _endpoint: &str) -> Result<Box<dyn Transport>> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) || attempt < self.fail_first.load(Ordering::SeqCst)
        {
            return Err(Error::Connection("connection refused".to_string()));
        }

        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();
        let (from_client_tx, from_client_rx) = mpsc::unbounded_channel();
        let link = BrokerLink {
            to_client: to_client_tx,
            from_client: from_client_rx,
        };
        self.links
            .lock()
            .expect("link channel lock")
            .send(link)
            .map_err(|_| Error::Connection("test harness dropped".to_string()))?;

        Ok(Box::new(ChannelTransport {
            inbound: to_client_rx,
            outbound: from_client_tx,
        }))
    }
}
