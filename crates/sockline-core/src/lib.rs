//! # sockline-core
//!
//! Shared vocabulary for the sockline engine crates:
//!
//! - **Branded IDs**: [`ConnectionId`] keys a connection from the moment it is accepted
//! - **Protocol**: engine.io/socket.io text frame taxonomy, decoder and encoders
//! - **Handshake**: the `Open` frame payload (`sid`, upgrades, ping parameters)
//! - **Logging**: `tracing` subscriber setup

#![deny(unsafe_code)]

pub mod ids;
pub mod logging;
pub mod protocol;

pub use ids::ConnectionId;
pub use protocol::handshake::{Handshake, HandshakeError};
pub use protocol::{DecodeError, Message, MessageType};
