//! # sockline-engine
//!
//! Per-connection messaging engine for a socket.io-style transport.
//!
//! Each accepted connection becomes a [`Session`] running three concurrent
//! tasks:
//!
//! - [`reader::run_reader`] decodes inbound frames, applies the handshake,
//!   answers pings and hands application frames to the [`EventDispatcher`]
//! - [`writer::run_writer`] drains the bounded outbound queue to the
//!   [`Transport`], enforcing the overflow policy
//! - [`keepalive::run_keepalive`] enqueues pings at the negotiated interval
//!
//! Every failure funnels into the single idempotent [`Session::close`].
//! Correlated sends ([`Session::ack`]) are matched to replies by the
//! per-session [`AckCorrelator`]. Sessions under soft backpressure are listed
//! in a shared [`OverflowRegistry`].

#![deny(unsafe_code)]

pub mod ack;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod keepalive;
pub mod liveness;
pub mod metrics;
pub mod overflow;
pub mod queue;
pub mod reader;
pub mod session;
pub mod transport;
pub mod writer;

pub use ack::AckCorrelator;
pub use config::SessionConfig;
pub use dispatcher::EventDispatcher;
pub use error::{AckError, CloseReason, SendError, SessionError};
pub use overflow::OverflowRegistry;
pub use session::{HandshakeRequest, Session, SessionHandle, SessionMeta, SessionState};
pub use transport::{PingParams, Transport, TransportError};
