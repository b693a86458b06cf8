//! Platform-aware path resolution for session-sync.
//!
//! On **Linux**, follows the XDG Base Directory Specification:
//! `$XDG_CONFIG_HOME/session-sync` or `~/.config/session-sync`.
//!
//! On **macOS**, uses Apple conventions with the XDG env var override:
//! `$XDG_CONFIG_HOME/session-sync` or `~/Library/Application Support/session-sync`.

use std::fs;
use std::path::{Path, PathBuf};

const APP_NAME: &str = "session-sync";

/// Returns the configuration directory for session-sync.
///
/// Resolution order:
/// 1. `$XDG_CONFIG_HOME/session-sync` (if env var set and non-empty, any platform)
/// 2. Platform default (see module docs)
pub fn config_dir() -> PathBuf {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(xdg) if !xdg.is_empty() => PathBuf::from(xdg).join(APP_NAME),
        _ => platform_config_dir().join(APP_NAME),
    }
}

/// Platform-native config base directory (without XDG override).
///
/// Falls back to the current directory when no home directory is known.
fn platform_config_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        dirs::config_dir().unwrap_or_else(|| PathBuf::from("."))
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::home_dir()
            .map(|home| home.join(".config"))
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

/// Returns the path to the main configuration file.
///
/// Resolves to `config_dir()/config.toml`.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Creates a directory and all parent directories with mode 0700.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    fs::create_dir_all(path)?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(0o700))?;
    }
    Ok(())
}

/// Creates the configuration directory if it does not exist, returning its path.
pub fn ensure_config_dir() -> std::io::Result<PathBuf> {
    let dir = config_dir();
    ensure_dir(&dir)?;
    Ok(dir)
}
