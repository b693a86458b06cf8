//! Logging initialization for the `sessync` binary.
//!
//! Configures the `tracing` subscriber with level filtering via the
//! `SESSYNC_LOG` environment variable. Falls back to the configured
//! `[logging] level` when the variable is unset or invalid.
//!
//! # Usage
//!
//! ```bash
//! # Configured level (info by default)
//! sessync replay scenario.json
//!
//! # Debug level
//! SESSYNC_LOG=debug sessync replay scenario.json
//!
//! # Module-specific filtering
//! SESSYNC_LOG=session_sync::navigation=debug,warn sessync replay scenario.json
//! ```

use crate::config::schema::LogLevel;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding filter directives.
pub const LOG_ENV_VAR: &str = "SESSYNC_LOG";

/// Builds the filter: `SESSYNC_LOG` if it parses, otherwise `default_level`.
pub fn filter(default_level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(default_level.as_directive()))
}

/// Initialize the tracing subscriber.
///
/// Output is written to stderr so that stdout stays free for command output
/// (the replay dump). Returns `false` if a global subscriber was already
/// installed.
pub fn init(default_level: LogLevel) -> bool {
    fmt()
        .with_env_filter(filter(default_level))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init()
        .is_ok()
}
