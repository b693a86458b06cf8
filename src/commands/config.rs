//! `sessync config` implementation.

use crate::ConfigAction;
use session_sync::config::error::ConfigError;
use session_sync::config::{default, loader::ConfigLoader, xdg};
use session_sync::engine::EngineSettings;
use std::process::ExitCode;

/// Runs a `config` action.
pub(crate) fn run_config_command(action: ConfigAction) -> ExitCode {
    let result = match action {
        ConfigAction::Init { force } => default::create_default_config(force).map(|path| {
            println!("Created configuration at {}", path.display());
        }),
        ConfigAction::Path => {
            println!("{}", xdg::config_path().display());
            Ok(())
        }
        ConfigAction::Validate { path } => validate(path.as_deref()),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Config error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Parses the file and resolves it into engine settings.
fn validate(path: Option<&std::path::Path>) -> Result<(), ConfigError> {
    let config = ConfigLoader::load(path)?;
    let settings = EngineSettings::try_from(&config)?;
    println!("Configuration is valid");
    println!("{settings:#?}");
    Ok(())
}
