//! Command-line parsing

use clap::Parser;
use reddit_dump::cli::{Cli, Commands};
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

#[test]
fn test_comments_defaults() {
    let cli = Cli::parse_from(["reddit-dump", "comments"]);
    match cli.command {
        Commands::Comments(cmd) => {
            assert!(cmd.user.is_none());
            assert_eq!(cmd.output, PathBuf::from("comments.json"));
        }
        other => panic!("expected comments command, got {other:?}"),
    }
    assert!(cli.metrics_addr.is_none());
}

#[test]
fn test_comments_with_user_and_output() {
    let cli = Cli::parse_from([
        "reddit-dump",
        "--config",
        "/etc/reddit.json",
        "comments",
        "--user",
        "bob",
        "-o",
        "dumps/bob.json",
    ]);
    assert_eq!(cli.config, PathBuf::from("/etc/reddit.json"));
    match cli.command {
        Commands::Comments(cmd) => {
            assert_eq!(cmd.user.as_deref(), Some("bob"));
            assert_eq!(cmd.output, PathBuf::from("dumps/bob.json"));
        }
        other => panic!("expected comments command, got {other:?}"),
    }
}

#[test]
fn test_get_with_params() {
    let cli = Cli::parse_from(["reddit-dump", "get", "/api/v1/me", "-p", "raw_json=1"]);
    match cli.command {
        Commands::Get(cmd) => {
            assert_eq!(cmd.endpoint, "/api/v1/me");
            assert_eq!(cmd.params, vec![("raw_json".to_string(), "1".to_string())]);
        }
        other => panic!("expected get command, got {other:?}"),
    }
}

#[test]
fn test_invalid_values_rejected() {
    assert!(Cli::try_parse_from(["reddit-dump", "--retry-delay", "-1", "comments"]).is_err());
    assert!(Cli::try_parse_from(["reddit-dump", "--retry-on-server-error", "99", "comments"]).is_err());
    assert!(Cli::try_parse_from(["reddit-dump", "get", "/x", "-p", "novalue"]).is_err());
    assert!(Cli::try_parse_from(["reddit-dump"]).is_err());
}

#[test]
fn test_load_config_applies_overrides() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"{"username": "alice", "password": "pw", "app_id": "app", "app_secret": "s", "retry_delay": 9}"#,
    )
    .unwrap();

    let path = file.path().to_str().unwrap().to_string();
    let cli = Cli::parse_from(["reddit-dump", "--config", &path, "--retry-delay", "2", "comments"]);
    let config = cli.load_config().unwrap();

    assert_eq!(config.retry_delay, 2.0);
    assert_eq!(config.username, "alice");
}
