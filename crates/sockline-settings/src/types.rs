//! Settings types.

use serde::{Deserialize, Serialize};

use crate::errors::{Result, SettingsError};

/// Smallest outbound queue the engine accepts.
pub const MIN_QUEUE_CAPACITY: usize = 4;
/// Largest outbound queue the engine accepts.
pub const MAX_QUEUE_CAPACITY: usize = 1_000_000;

/// Root settings object.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocklineSettings {
    /// Per-connection engine settings.
    pub engine: EngineSettings,
    /// Log output settings.
    pub logging: LoggingSettings,
}

impl SocklineSettings {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        let cap = self.engine.queue_capacity;
        if !(MIN_QUEUE_CAPACITY..=MAX_QUEUE_CAPACITY).contains(&cap) {
            return Err(SettingsError::InvalidValue(format!(
                "engine.queueCapacity {cap} outside {MIN_QUEUE_CAPACITY}..={MAX_QUEUE_CAPACITY}"
            )));
        }
        if self.engine.ack_timeout_ms == 0 {
            return Err(SettingsError::InvalidValue(
                "engine.ackTimeoutMs must be positive".into(),
            ));
        }
        Ok(())
    }
}

/// Outbound queue and ack settings, shared by every session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineSettings {
    /// Outbound frame queue capacity per session.
    pub queue_capacity: usize,
    /// Default deadline for correlated sends, in milliseconds.
    pub ack_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            queue_capacity: 10_000,
            ack_timeout_ms: 30_000,
        }
    }
}

/// Log output settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub level: String,
    /// Emit JSON lines instead of compact text.
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

impl LoggingSettings {
    /// Install the global tracing subscriber these settings describe.
    /// Later calls keep the first subscriber.
    pub fn init_subscriber(&self) {
        if self.json {
            sockline_core::logging::init_json_subscriber(&self.level);
        } else {
            sockline_core::logging::init_subscriber(&self.level);
        }
    }
}
