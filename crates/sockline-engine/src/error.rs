//! Engine error and close-cause types.

use std::time::Duration;

use sockline_core::DecodeError;
use thiserror::Error;

use crate::transport::TransportError;

/// Why an enqueue was refused. Producers never block.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum SendError {
    /// The session is closed; nothing more is accepted.
    #[error("session closed")]
    Closed,
    /// The outbound queue holds `capacity` frames already.
    #[error("outbound queue full ({capacity} frames)")]
    QueueFull {
        /// Queue capacity.
        capacity: usize,
    },
}

/// Outcome of a correlated send that produced no reply payload.
///
/// A timeout is an expected result for the caller; it never closes the
/// session.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AckError {
    /// No matching reply before the deadline.
    #[error("no ack within {deadline:?}")]
    Timeout {
        /// Deadline the caller asked for.
        deadline: Duration,
    },
    /// The session closed while the waiter was pending.
    #[error("session closed before ack arrived")]
    SessionClosed,
    /// The request frame could not be enqueued.
    #[error(transparent)]
    Send(#[from] SendError),
}

/// Cause handed to [`Session::close`](crate::Session::close) and to the
/// disconnect notification.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum CloseReason {
    /// Closed by application code.
    #[error("closed by application")]
    Requested,
    /// Peer sent a close frame.
    #[error("closed by peer")]
    PeerClosed,
    /// Handshake payload was malformed.
    #[error("bad handshake: {0}")]
    Header(String),
    /// Outbound queue saturated.
    #[error("outbound queue overflow ({depth}/{capacity} frames)")]
    Overflow {
        /// Depth observed by the writer.
        depth: usize,
        /// Queue capacity.
        capacity: usize,
    },
    /// Transport read or write failed.
    #[error("transport failure: {0}")]
    Transport(TransportError),
    /// Inbound frame failed to decode.
    #[error("protocol error: {0}")]
    Protocol(DecodeError),
}

impl CloseReason {
    /// Short label for logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Requested => "requested",
            Self::PeerClosed => "peer_closed",
            Self::Header(_) => "header",
            Self::Overflow { .. } => "overflow",
            Self::Transport(_) => "transport",
            Self::Protocol(_) => "protocol",
        }
    }
}

/// Error that ended a reader or writer loop, reported to whoever awaits it.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Transport read or write failed.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
    /// Inbound frame failed to decode.
    #[error("protocol error: {0}")]
    Protocol(#[from] DecodeError),
    /// Writer sacrificed the session to bound memory.
    #[error("outbound queue overflow ({depth}/{capacity} frames)")]
    Overflow {
        /// Depth observed by the writer.
        depth: usize,
        /// Queue capacity.
        capacity: usize,
    },
    /// A loop task panicked or was aborted.
    #[error("session task failed: {0}")]
    Task(String),
}
