//! `sessync replay` implementation.

use session_sync::config::loader::ConfigLoader;
use session_sync::engine::EngineSettings;
use session_sync::logging;
use session_sync::scenario::{self, Scenario};
use std::path::Path;
use std::process::ExitCode;

/// Loads configuration and scenario, replays it and prints the final state
/// as pretty JSON on stdout.
///
/// Exits non-zero when the configuration or the scenario cannot be loaded.
/// Failing steps are logged but do not change the exit code.
pub(crate) fn run_replay_command(file: &Path, config: Option<&Path>, reports: bool) -> ExitCode {
    let config = match ConfigLoader::load(config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {e}");
            return ExitCode::FAILURE;
        }
    };
    let settings = match EngineSettings::try_from(&config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Config error: {e}");
            return ExitCode::FAILURE;
        }
    };
    logging::init(config.logging.level);

    let scenario = match Scenario::from_path(file) {
        Ok(scenario) => scenario,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let rt = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Error: failed to create tokio runtime: {e}");
            return ExitCode::FAILURE;
        }
    };
    let replay = rt.block_on(scenario::replay(&scenario, settings));

    let failed = replay.reports.iter().filter(|r| !r.ok).count();
    tracing::info!(steps = replay.reports.len(), failed, "replay finished");

    let output = if reports {
        serde_json::to_string_pretty(&replay)
    } else {
        serde_json::to_string_pretty(&replay.dump)
    };
    match output {
        Ok(json) => {
            println!("{json}");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: failed to serialize engine state: {e}");
            ExitCode::FAILURE
        }
    }
}
