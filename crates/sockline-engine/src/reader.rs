//! Reader loop: transport → decode → handshake / keepalive / dispatch.

use std::sync::Arc;

use metrics::counter;
use sockline_core::protocol::{self, PONG_FRAME};
use sockline_core::{Handshake, Message, MessageType};
use tracing::{Instrument, debug, info, instrument, trace, warn};

use crate::error::{CloseReason, SessionError};
use crate::metrics::MESSAGES_DISPATCHED_TOTAL;
use crate::session::Session;

/// Read frames until the transport fails, a frame fails to decode, or the
/// session closes.
///
/// Every failure closes the session before it is returned. Finding the
/// session already closed is a clean exit.
#[instrument(skip_all, fields(connection_id = %session.connection_id()))]
pub async fn run_reader(session: Arc<Session>) -> Result<(), SessionError> {
    while session.is_alive() {
        let raw = match session.transport().receive().await {
            Ok(raw) => raw,
            Err(_) if !session.is_alive() => break,
            Err(e) => {
                debug!(error = %e, "transport read failed");
                session.close(CloseReason::Transport(e.clone())).await;
                return Err(e.into());
            }
        };

        let message = match protocol::decode(&raw) {
            Ok(message) => message,
            Err(e) => {
                warn!(error = %e, frame_len = raw.len(), "undecodable frame");
                session.close(CloseReason::Protocol(e.clone())).await;
                return Err(e.into());
            }
        };

        match message.kind {
            MessageType::Open => on_open(&session, &raw).await,
            MessageType::Ping => {
                if let Err(e) = session.enqueue(PONG_FRAME.to_owned()) {
                    debug!(error = %e, "pong not queued");
                }
            }
            MessageType::Pong => trace!("pong"),
            MessageType::Close => {
                session.close(CloseReason::PeerClosed).await;
                break;
            }
            MessageType::AckResponse => on_ack_response(&session, message),
            _ => dispatch(&session, message),
        }
    }
    Ok(())
}

async fn on_open(session: &Arc<Session>, raw: &str) {
    match Handshake::from_open_frame(raw) {
        Ok(handshake) => {
            let sid = handshake.sid.clone();
            if !session.set_handshake(handshake) {
                warn!(sid, "duplicate open frame ignored");
                return;
            }
            info!(sid, "handshake applied");
        }
        Err(e) => {
            // The connected notification still fires below, on a session that
            // is already closed.
            warn!(error = %e, "malformed handshake");
            session.close(CloseReason::Header(e.to_string())).await;
        }
    }
    session.dispatcher().on_connection(session.clone()).await;
}

fn on_ack_response(session: &Session, message: Message) {
    let Some(id) = message.ack_id else {
        return;
    };
    if !session.acks().resolve(id, message.args) {
        debug!(ack_id = id, "ack response with no pending waiter dropped");
    }
}

// Fire and forget. Handlers start in arrival order; they may finish in any.
fn dispatch(session: &Arc<Session>, message: Message) {
    debug_assert!(message.kind.is_application());
    counter!(MESSAGES_DISPATCHED_TOTAL).increment(1);
    trace!(kind = ?message.kind, event = ?message.event, "dispatching");
    let dispatcher = session.dispatcher().clone();
    let session = session.clone();
    let _ = tokio::spawn(
        async move { dispatcher.on_message(session, message).await }.in_current_span(),
    );
}
