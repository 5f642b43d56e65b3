//! Keepalive timer.
//!
//! Only sends pings. Pongs are not tracked, so a peer that goes silent
//! without erroring the transport is not reaped here.

use std::sync::Arc;

use sockline_core::protocol::PING_FRAME;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, instrument, trace, warn};

use crate::error::SendError;
use crate::session::Session;

/// Enqueue a ping every negotiated interval while the session is alive.
#[instrument(skip_all, fields(connection_id = %session.connection_id()))]
pub async fn run_keepalive(session: Arc<Session>) {
    let period = session.transport().ping_params().interval;
    if period.is_zero() {
        warn!("ping interval is zero, keepalive disabled");
        return;
    }

    let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        let _ = ticker.tick().await;
        if !session.is_alive() {
            debug!("keepalive stopped");
            return;
        }
        match session.enqueue(PING_FRAME.to_owned()) {
            Ok(()) => trace!("ping queued"),
            Err(SendError::Closed) => return,
            Err(e @ SendError::QueueFull { .. }) => debug!(error = %e, "ping dropped"),
        }
    }
}
