//! Writer loop: outbound queue → transport, with the overflow policy.

use std::sync::Arc;

use tracing::{debug, instrument, trace, warn};

use crate::error::{CloseReason, SessionError};
use crate::queue::Outbound;
use crate::session::{Backpressure, Session};

/// Drain the outbound queue until the terminal marker or a failure.
///
/// Before each dequeue the queue depth `d` is compared with capacity `C`:
/// at `d >= C - 1` the session is closed without writing anything further,
/// above `C / 2` it is listed in the overflow registry, at or below `C / 2`
/// it is delisted.
#[instrument(skip_all, fields(connection_id = %session.connection_id()))]
pub async fn run_writer(session: Arc<Session>) -> Result<(), SessionError> {
    loop {
        match session.apply_backpressure() {
            Backpressure::Overflow { depth } => {
                let capacity = session.config().queue_capacity;
                warn!(depth, capacity, "outbound queue overflow, closing session");
                session.close(CloseReason::Overflow { depth, capacity }).await;
                return Err(SessionError::Overflow { depth, capacity });
            }
            Backpressure::Soft { depth } => trace!(depth, "outbound queue under pressure"),
            Backpressure::Normal => {}
        }

        let frame = match session.queue().pop().await {
            Outbound::Frame(frame) => frame,
            Outbound::Shutdown => {
                debug!("writer stopped");
                return Ok(());
            }
        };

        if let Err(e) = session.transport().send(&frame).await {
            if !session.is_alive() {
                return Ok(());
            }
            debug!(error = %e, "transport write failed");
            session.close(CloseReason::Transport(e.clone())).await;
            return Err(e.into());
        }
    }
}
