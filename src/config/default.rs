//! Default configuration template and file creation utilities.
//!
//! Provides a commented TOML template that matches `Config::default()` and
//! functions to write it to the XDG config path.

use std::fs;
use std::path::{Path, PathBuf};

use crate::config::error::ConfigError;
use crate::config::xdg;

// ---------------------------------------------------------------------------
// Default TOML template
// ---------------------------------------------------------------------------

/// A commented TOML template with all default values.
///
/// Every value here must match `Config::default()` from `schema.rs`.
pub const DEFAULT_CONFIG_TEMPLATE: &str = r#"# session-sync configuration
#
# This file was auto-generated with default values.
# All values shown below are the built-in defaults.
#
# Location: $XDG_CONFIG_HOME/session-sync/config.toml

# ==============================================================================
# Navigation guard
# ==============================================================================

[navigation]

# Minimum time between two accepted navigations (tab switches).
# Navigations inside this window are refused, not queued.
# Examples: "300ms", "500ms", "1s"
debounce_window = "300ms"

# How long a navigation stays pending after its action completed.
# A second navigation to the same target during this time is refused.
pending_grace = "100ms"

# ==============================================================================
# Session directory cache
# ==============================================================================

[directory]

# Refetch the session directory after a delete, rename or create commits.
refetch_after_mutation = true

# Refetch the session directory when a stream ends, so the message log
# picks up what the server persisted.
refetch_on_stream_end = true

# ==============================================================================
# Tabs
# ==============================================================================

[tabs]

# How many closed tabs are remembered for reopen. 0 disables the history.
max_closed_tabs = 20

# ==============================================================================
# Events
# ==============================================================================

[events]

# Events buffered per subscriber. Slow subscribers that fall further
# behind skip the oldest events.
channel_capacity = 256

# ==============================================================================
# Logging
# ==============================================================================

[logging]

# Logging verbosity level.
# Options: "error", "warn", "info", "debug", "trace"
# The SESSYNC_LOG environment variable overrides this (EnvFilter syntax).
level = "info"
"#;

// ---------------------------------------------------------------------------
// File creation functions
// ---------------------------------------------------------------------------

/// Creates (or force-overwrites) the default config file.
///
/// - If the file exists and `force` is `false`, returns `ConfigError::AlreadyExists`.
/// - If the file exists and `force` is `true`, backs it up to `.toml.backup` first.
/// - Returns the path where the config was written.
pub fn create_default_config(force: bool) -> Result<PathBuf, ConfigError> {
    let path = xdg::config_path();

    if path.exists() {
        if !force {
            return Err(ConfigError::AlreadyExists { path });
        }
        let backup_path = path.with_extension("toml.backup");
        fs::rename(&path, &backup_path).map_err(|e| ConfigError::WriteError {
            path: backup_path.clone(),
            source: e,
        })?;
        tracing::info!("Backed up existing config to {}", backup_path.display());
    }

    write_default_config(&path)?;
    tracing::info!("Created default configuration at {}", path.display());
    Ok(path)
}

/// Writes the default template to `path`, creating parent dirs and setting 0600 permissions.
fn write_default_config(path: &Path) -> Result<(), ConfigError> {
    xdg::ensure_config_dir().map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    fs::write(path, DEFAULT_CONFIG_TEMPLATE).map_err(|e| ConfigError::WriteError {
        path: path.to_path_buf(),
        source: e,
    })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| {
            ConfigError::WriteError {
                path: path.to_path_buf(),
                source: e,
            }
        })?;
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::Config;
    use crate::engine::EngineSettings;
    use serial_test::serial;

    /// Run closure with `XDG_CONFIG_HOME` temporarily pointed at `dir`.
    fn with_xdg_config<F: FnOnce()>(dir: &Path, f: F) {
        let original = std::env::var("XDG_CONFIG_HOME").ok();
        std::env::set_var("XDG_CONFIG_HOME", dir);
        f();
        match original {
            Some(v) => std::env::set_var("XDG_CONFIG_HOME", v),
            None => std::env::remove_var("XDG_CONFIG_HOME"),
        }
    }

    // -- Template validity --------------------------------------------------

    #[test]
    fn template_values_match_config_default() {
        let from_template: Config =
            toml::from_str(DEFAULT_CONFIG_TEMPLATE).expect("template should parse");
        assert_eq!(from_template, Config::default());
    }

    #[test]
    fn template_resolves_to_default_engine_settings() {
        let config: Config =
            toml::from_str(DEFAULT_CONFIG_TEMPLATE).expect("template should parse");
        let settings = EngineSettings::try_from(&config).expect("template should resolve");
        assert_eq!(settings, EngineSettings::default());
    }

    #[test]
    fn template_contains_all_section_headers() {
        for header in ["[navigation]", "[directory]", "[tabs]", "[events]", "[logging]"] {
            assert!(
                DEFAULT_CONFIG_TEMPLATE.contains(header),
                "missing {header} section"
            );
        }
    }

    // -- create_default_config ----------------------------------------------

    #[test]
    #[serial]
    fn create_writes_template_at_xdg_path() {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        let expected = tmp.path().join("session-sync/config.toml");
        with_xdg_config(tmp.path(), || {
            let path = create_default_config(false).expect("should succeed");
            assert_eq!(path, expected);
            let content = fs::read_to_string(&path).expect("should read");
            assert_eq!(content, DEFAULT_CONFIG_TEMPLATE);
        });
    }

    #[test]
    #[serial]
    fn create_without_force_returns_already_exists() {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        with_xdg_config(tmp.path(), || {
            create_default_config(false).expect("first call should succeed");
            let err = create_default_config(false).expect_err("should fail with AlreadyExists");
            match err {
                ConfigError::AlreadyExists { .. } => {}
                other => panic!("expected AlreadyExists, got: {other:?}"),
            }
        });
    }

    #[test]
    #[serial]
    fn create_with_force_creates_backup() {
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        with_xdg_config(tmp.path(), || {
            let path = create_default_config(false).expect("first call should succeed");
            fs::write(&path, "# custom content\n").expect("overwrite for test");

            let new_path = create_default_config(true).expect("force should succeed");
            assert_eq!(new_path, path);

            let backup = path.with_extension("toml.backup");
            let backup_content = fs::read_to_string(&backup).expect("read backup");
            assert_eq!(backup_content, "# custom content\n");
            let content = fs::read_to_string(&path).expect("read new");
            assert_eq!(content, DEFAULT_CONFIG_TEMPLATE);
        });
    }

    #[cfg(unix)]
    #[test]
    #[serial]
    fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = tempfile::tempdir().expect("failed to create temp dir");
        with_xdg_config(tmp.path(), || {
            let path = create_default_config(false).expect("should succeed");
            let mode = fs::metadata(&path).expect("metadata").permissions().mode();
            assert_eq!(mode & 0o777, 0o600, "file should be owner-only read/write");
        });
    }
}
