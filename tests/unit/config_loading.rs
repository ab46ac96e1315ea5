//! Configuration file loading

use reddit_dump::config::{ClientConfig, ConfigError};
use std::io::Write;
use std::time::Duration;
use tempfile::NamedTempFile;

fn write_config(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_full_config_file() {
    let file = write_config(
        r#"{
            "username": "alice",
            "password": "hunter2",
            "totp": "654321",
            "app_id": "app",
            "app_secret": "secret",
            "user_agent": "script:dump:v1 (by /u/alice)",
            "retry_on_wait": true,
            "retry_on_server_error": 5,
            "retry_delay": 1.5
        }"#,
    );

    let config = ClientConfig::from_file(file.path()).unwrap();
    assert_eq!(config.user_agent, "script:dump:v1 (by /u/alice)");
    assert!(config.retry_on_wait);
    assert_eq!(config.retry_delay(), Duration::from_millis(1500));

    let options = config.client_options();
    assert_eq!(options.retry_on_server_error, 5);
    assert!(!options.retry_on_403_in_transport);

    let credentials = config.credentials();
    assert_eq!(credentials.password(), "hunter2:654321");
    assert_eq!(credentials.client_id(), "app");
}

#[test]
fn test_missing_file_is_io_error() {
    let err = ClientConfig::from_file("/nonexistent/reddit-dump/config.json").unwrap_err();
    assert!(matches!(err, ConfigError::Io { .. }));
    assert!(err.to_string().contains("/nonexistent/reddit-dump/config.json"));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let file = write_config("{ not json");
    let err = ClientConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_negative_delay_rejected() {
    let file = write_config(
        r#"{"username": "a", "password": "b", "app_id": "c", "app_secret": "d", "retry_delay": -2}"#,
    );
    let err = ClientConfig::from_file(file.path()).unwrap_err();
    assert!(matches!(err, ConfigError::Invalid(_)));
}
