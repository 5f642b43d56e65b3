//! # sockline-settings
//!
//! Configuration with layered sources. Priority, lowest first:
//! 1. **Compiled defaults** — [`SocklineSettings::default()`]
//! 2. **Settings file** — JSON, deep-merged over defaults
//! 3. **Environment variables** — `SOCKLINE_*` overrides

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{apply_env_overrides, deep_merge, load_settings, load_settings_from_path};
pub use types::{EngineSettings, LoggingSettings, SocklineSettings};
