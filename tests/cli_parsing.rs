use clap::Parser;
use ledgerbridge::cli::commands::config::ConfigCommands;
use ledgerbridge::cli::{Cli, Commands};
use ledgerbridge::CacheCategory;
use std::path::PathBuf;

#[test]
fn test_parse_fetch_defaults() {
    let cli = Cli::try_parse_from(["ledgerbridge", "fetch", "/contacts"]).unwrap();

    assert!(!cli.json);
    match cli.command {
        Commands::Fetch(args) => {
            assert_eq!(args.path, "/contacts");
            assert_eq!(args.category, CacheCategory::Transactional);
            assert!(args.params.is_empty());
            assert!(!args.force);
        }
        other => panic!("Wrong top-level command: {other:?}"),
    }
}

#[test]
fn test_parse_fetch_with_stats_and_category() {
    let cli = Cli::try_parse_from([
        "ledgerbridge",
        "fetch",
        "/reports/balance-sheet",
        "-C",
        "analytical",
        "--stats",
    ])
    .unwrap();

    let Commands::Fetch(args) = cli.command else {
        panic!("Wrong top-level command");
    };
    assert_eq!(args.category, CacheCategory::Analytical);
    assert!(args.stats);
}

#[test]
fn test_parse_status_with_probe() {
    let cli = Cli::try_parse_from(["ledgerbridge", "--json", "status", "--probe-path", "/ping"])
        .unwrap();

    assert!(cli.json);
    let Commands::Status(args) = cli.command else {
        panic!("Wrong top-level command");
    };
    assert_eq!(args.probe_path.as_deref(), Some("/ping"));
}

#[test]
fn test_parse_config_show_with_file() {
    let cli = Cli::try_parse_from([
        "ledgerbridge",
        "config",
        "show",
        "--config",
        "/etc/ledgerbridge.yaml",
    ])
    .unwrap();

    assert_eq!(cli.config, Some(PathBuf::from("/etc/ledgerbridge.yaml")));
    let Commands::Config(args) = cli.command else {
        panic!("Wrong top-level command");
    };
    assert!(matches!(args.command, ConfigCommands::Show));
}

#[test]
fn test_fetch_requires_path() {
    assert!(Cli::try_parse_from(["ledgerbridge", "fetch"]).is_err());
}
