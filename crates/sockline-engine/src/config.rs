//! Per-session configuration.

use std::time::Duration;

use sockline_settings::EngineSettings;
use sockline_settings::types::MIN_QUEUE_CAPACITY;

/// Limits applied to every session built with this config.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Outbound queue capacity `C`. The writer closes the session once the
    /// queue holds `C - 1` frames and flags it as overflowing above `C / 2`.
    pub queue_capacity: usize,
    /// Deadline used by [`Session::ack_default`](crate::Session::ack_default).
    pub ack_timeout: Duration,
}

impl SessionConfig {
    /// Override the queue capacity (clamped to the engine minimum).
    #[must_use]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(MIN_QUEUE_CAPACITY);
        self
    }

    /// Override the default ack deadline.
    #[must_use]
    pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
        self.ack_timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for SessionConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            queue_capacity: settings.queue_capacity.max(MIN_QUEUE_CAPACITY),
            ack_timeout: Duration::from_millis(settings.ack_timeout_ms),
        }
    }
}
