//! TOML configuration schema types.
//!
//! All structs derive `Deserialize` and `Serialize` with defaults via
//! `#[serde(default)]`, so a partial (or empty) file is valid.
//!
//! Duration fields use human-readable strings (e.g. `"300ms"`, `"1s"`)
//! parsed by the `humantime` crate when the engine settings are resolved.

use serde::{Deserialize, Serialize};

use crate::events::DEFAULT_EVENT_CHANNEL_CAPACITY;
use crate::tabs::DEFAULT_MAX_CLOSED_TABS;

// ---------------------------------------------------------------------------
// Top-level Config
// ---------------------------------------------------------------------------

/// Root configuration encompassing all sections.
///
/// ```toml
/// [navigation]
/// [directory]
/// [tabs]
/// [events]
/// [logging]
/// ```
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Navigation guard timing.
    pub navigation: NavigationConfig,
    /// Directory cache refresh policy.
    pub directory: DirectoryConfig,
    /// Tab registry limits.
    pub tabs: TabsConfig,
    /// Event channel settings.
    pub events: EventsConfig,
    /// Log output.
    pub logging: LoggingConfig,
}

// ---------------------------------------------------------------------------
// Navigation
// ---------------------------------------------------------------------------

/// Navigation guard configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct NavigationConfig {
    /// Minimum time between two accepted navigations.
    pub debounce_window: String,
    /// How long a navigation stays pending after its action finished.
    pub pending_grace: String,
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            debounce_window: "300ms".to_string(),
            pending_grace: "100ms".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Directory
// ---------------------------------------------------------------------------

/// Directory cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct DirectoryConfig {
    /// Refetch the directory after a committed delete, rename or create.
    pub refetch_after_mutation: bool,
    /// Refetch the directory when a stream ends.
    pub refetch_on_stream_end: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self {
            refetch_after_mutation: true,
            refetch_on_stream_end: true,
        }
    }
}

// ---------------------------------------------------------------------------
// Tabs / Events
// ---------------------------------------------------------------------------

/// Tab registry configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct TabsConfig {
    /// Closed tabs remembered for reopen. Zero disables the history.
    pub max_closed_tabs: usize,
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            max_closed_tabs: DEFAULT_MAX_CLOSED_TABS,
        }
    }
}

/// Event channel configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct EventsConfig {
    /// Events buffered per subscriber before it starts lagging.
    pub channel_capacity: usize,
}

impl Default for EventsConfig {
    fn default() -> Self {
        Self {
            channel_capacity: DEFAULT_EVENT_CHANNEL_CAPACITY,
        }
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration. `SESSYNC_LOG` overrides `level` when set.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(default)]
pub struct LoggingConfig {
    /// Logging verbosity.
    pub level: LogLevel,
}

/// Log verbosity levels (lowercase in TOML).
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors.
    Error,
    /// Errors and warnings.
    Warn,
    /// Informational messages (default).
    #[default]
    Info,
    /// Debug-level detail.
    Debug,
    /// Full trace output.
    Trace,
}

impl LogLevel {
    /// The directive understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
