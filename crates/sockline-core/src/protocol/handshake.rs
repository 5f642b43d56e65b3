//! Handshake record carried by the `Open` frame.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Session header negotiated on `Open`.
///
/// All four fields are required; a payload missing any of them is rejected
/// as a whole.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Handshake {
    /// Peer-visible session id.
    pub sid: String,
    /// Transports the peer may upgrade to.
    pub upgrades: Vec<String>,
    /// Keepalive ping period in milliseconds.
    pub ping_interval: u64,
    /// Keepalive pong deadline in milliseconds.
    pub ping_timeout: u64,
}

/// Failure to read a handshake out of an `Open` frame.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// Frame shorter than its one-byte type prefix.
    #[error("open frame has no payload")]
    MissingPayload,
    /// Payload is not a complete handshake object.
    #[error("malformed handshake: {0}")]
    Json(#[from] serde_json::Error),
}

impl Handshake {
    /// Parse the payload of a raw `Open` frame, skipping its type prefix.
    pub fn from_open_frame(raw: &str) -> Result<Self, HandshakeError> {
        let payload = raw
            .get(1..)
            .filter(|p| !p.is_empty())
            .ok_or(HandshakeError::MissingPayload)?;
        Ok(serde_json::from_str(payload)?)
    }

    /// Encode as a raw `Open` frame.
    pub fn to_open_frame(&self) -> Result<String, HandshakeError> {
        Ok(format!("0{}", serde_json::to_string(self)?))
    }

    /// Ping period as a [`Duration`].
    pub fn interval(&self) -> Duration {
        Duration::from_millis(self.ping_interval)
    }

    /// Pong deadline as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.ping_timeout)
    }
}
