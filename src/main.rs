//! session-sync - CLI entry point
//!
//! `sessync` replays scripted scenarios against the synchronization engine
//! and manages the configuration file.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;

#[cfg(test)]
mod cli_tests;

/// Session and stream state synchronization engine
#[derive(Parser)]
#[command(name = "sessync")]
#[command(version, about = "Session and stream state synchronization engine")]
pub(crate) struct Cli {
    #[command(subcommand)]
    pub(crate) command: Commands,
}

/// Available subcommands for the sessync CLI
#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Replay a JSON scenario and print the final engine state
    Replay {
        /// Scenario file
        file: PathBuf,
        /// Configuration file (defaults to the XDG location)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Print the per-step reports along with the final state
        #[arg(long)]
        reports: bool,
    },

    /// Manage configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Actions for the `config` subcommand.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Create default configuration file
    Init {
        /// Overwrite existing configuration (creates backup)
        #[arg(long)]
        force: bool,
    },
    /// Show configuration file path
    Path,
    /// Validate configuration file
    Validate {
        /// File to validate (defaults to the XDG location)
        path: Option<PathBuf>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.command {
        Commands::Replay {
            file,
            config,
            reports,
        } => commands::run_replay_command(&file, config.as_deref(), reports),
        Commands::Config { action } => commands::run_config_command(action),
    }
}
