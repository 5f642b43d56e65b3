//! Transport collaborator: an opaque source and sink of text frames.
//!
//! The engine reads from one task and writes from another, so both methods
//! take `&self`; implementations split their I/O halves internally.

pub mod mem;
#[cfg(feature = "websocket")]
pub mod websocket;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Keepalive parameters negotiated by the transport.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PingParams {
    /// Period between pings.
    pub interval: Duration,
    /// How long the peer has to answer a ping.
    pub timeout: Duration,
}

impl Default for PingParams {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(25),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Transport read/write failures.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum TransportError {
    /// The connection is gone (closed locally or by the peer).
    #[error("transport closed")]
    Closed,
    /// Underlying I/O or framing failure.
    #[error("transport I/O failed: {0}")]
    Io(String),
}

/// A bidirectional frame transport owned by exactly one session.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Wait for the next inbound frame.
    async fn receive(&self) -> Result<String, TransportError>;

    /// Write one frame.
    async fn send(&self, frame: &str) -> Result<(), TransportError>;

    /// Close the connection. Pending and later `receive`/`send` calls fail
    /// with [`TransportError::Closed`].
    async fn close(&self);

    /// Negotiated keepalive parameters.
    fn ping_params(&self) -> PingParams;
}
