use crate::{Cli, Commands, ConfigAction};
use clap::{CommandFactory, Parser};
use std::path::PathBuf;

#[test]
fn verify_cli() {
    Cli::command().debug_assert();
}

#[test]
fn replay_takes_scenario_file() {
    let cli = Cli::try_parse_from(["sessync", "replay", "scenario.json"]).unwrap();
    match cli.command {
        Commands::Replay {
            file,
            config,
            reports,
        } => {
            assert_eq!(file, PathBuf::from("scenario.json"));
            assert!(config.is_none());
            assert!(!reports);
        }
        _ => panic!("unexpected command variant"),
    }
}

#[test]
fn replay_with_config_and_reports() {
    let cli = Cli::try_parse_from([
        "sessync",
        "replay",
        "--config",
        "/etc/sessync.toml",
        "--reports",
        "s.json",
    ])
    .unwrap();
    match cli.command {
        Commands::Replay {
            config, reports, ..
        } => {
            assert_eq!(config, Some(PathBuf::from("/etc/sessync.toml")));
            assert!(reports);
        }
        _ => panic!("unexpected command variant"),
    }
}

#[test]
fn replay_requires_file() {
    assert!(Cli::try_parse_from(["sessync", "replay"]).is_err());
}

#[test]
fn config_init_force_parses() {
    let cli = Cli::try_parse_from(["sessync", "config", "init", "--force"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            action: ConfigAction::Init { force: true }
        }
    ));
}

#[test]
fn config_path_parses() {
    let cli = Cli::try_parse_from(["sessync", "config", "path"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            action: ConfigAction::Path
        }
    ));
}

#[test]
fn config_validate_with_optional_path() {
    let cli = Cli::try_parse_from(["sessync", "config", "validate"]).unwrap();
    assert!(matches!(
        cli.command,
        Commands::Config {
            action: ConfigAction::Validate { path: None }
        }
    ));

    let cli = Cli::try_parse_from(["sessync", "config", "validate", "x.toml"]).unwrap();
    match cli.command {
        Commands::Config {
            action: ConfigAction::Validate { path },
        } => assert_eq!(path, Some(PathBuf::from("x.toml"))),
        _ => panic!("unexpected command variant"),
    }
}

#[test]
fn config_without_action_fails() {
    assert!(Cli::try_parse_from(["sessync", "config"]).is_err());
}

#[test]
fn unknown_subcommand_fails() {
    assert!(Cli::try_parse_from(["sessync", "daemon"]).is_err());
}
