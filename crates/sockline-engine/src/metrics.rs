//! Metric names recorded through the `metrics` facade.
//!
//! The engine installs no recorder; embedders pick an exporter.

/// Sessions constructed (counter).
pub const SESSIONS_OPENED_TOTAL: &str = "sockline_sessions_opened_total";
/// Sessions torn down (counter, labels: reason).
pub const SESSIONS_CLOSED_TOTAL: &str = "sockline_sessions_closed_total";
/// Sessions constructed and not yet closed (gauge).
pub const SESSIONS_ACTIVE: &str = "sockline_sessions_active";
/// Sessions currently in an overflow registry (gauge).
pub const SESSIONS_OVERFLOWING: &str = "sockline_sessions_overflowing";
/// Outbound frames abandoned at close (counter).
pub const FRAMES_DISCARDED_TOTAL: &str = "sockline_frames_discarded_total";
/// Inbound frames handed to the dispatcher (counter).
pub const MESSAGES_DISPATCHED_TOTAL: &str = "sockline_messages_dispatched_total";
/// Correlated sends that hit their deadline (counter).
pub const ACK_TIMEOUTS_TOTAL: &str = "sockline_ack_timeouts_total";
