//! Integration tests for configuration loader
//!
//! Tests the end-to-end behavior of loading configuration from files.

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use calmirror_domain::constants::{DEFAULT_PAGE_SIZE, GOOGLE_CALENDAR_API_BASE};
use calmirror_infra::config;
use tempfile::Builder;

fn write_config(suffix: &str, contents: &str) -> tempfile::NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().expect("Failed to create temp file");
    file.write_all(contents.as_bytes()).expect("Failed to write to temp file");
    file
}

#[test]
fn test_load_config_from_json_file() {
    let json_content = r#"{
        "storage": {
            "db_path": "/tmp/calmirror-it/sync.db",
            "pool_size": 2
        },
        "google": {
            "credentials_path": "/tmp/calmirror-it/client_secret.json",
            "token_store_path": "/tmp/calmirror-it/tokens.json",
            "request_timeout_secs": 10
        },
        "sync": {
            "rate_limit_interval_ms": 500,
            "page_size": 100
        }
    }"#;
    let file = write_config(".json", json_content);

    let config = config::load_from_file(file.path()).expect("Failed to load config from JSON file");

    assert_eq!(config.storage.db_path, Some(PathBuf::from("/tmp/calmirror-it/sync.db")));
    assert_eq!(config.storage.pool_size, 2);
    assert_eq!(
        config.google.credentials_path,
        Some(PathBuf::from("/tmp/calmirror-it/client_secret.json"))
    );
    assert_eq!(config.google.request_timeout(), Duration::from_secs(10));
    assert_eq!(config.sync.rate_limit_interval(), Duration::from_millis(500));
    assert_eq!(config.sync.page_size, 100);

    // Unspecified fields keep their defaults
    assert_eq!(config.google.api_base_url, GOOGLE_CALENDAR_API_BASE);
    assert!(!config.google.scopes.is_empty());
}

#[test]
fn test_load_config_from_toml_file() {
    let toml_content = r#"
        [storage]
        db_path = "/tmp/calmirror-it/mirror.db"

        [google]
        client_id = "1234.apps.googleusercontent.com"
        client_secret = "not-so-secret"
        api_base_url = "http://127.0.0.1:9000/calendar/v3"
    "#;
    let file = write_config(".toml", toml_content);

    let config = config::load_from_file(file.path()).expect("Failed to load config from TOML file");

    assert_eq!(config.storage.db_path, Some(PathBuf::from("/tmp/calmirror-it/mirror.db")));
    assert_eq!(config.google.client_id.as_deref(), Some("1234.apps.googleusercontent.com"));
    assert_eq!(config.google.client_secret.as_deref(), Some("not-so-secret"));
    assert_eq!(config.google.api_base_url, "http://127.0.0.1:9000/calendar/v3");
    assert_eq!(config.sync.page_size, DEFAULT_PAGE_SIZE);
    assert!(config.google.token_store_path.is_none());
}

#[test]
fn test_load_config_invalid_toml() {
    let file = write_config(".toml", "[storage\npool_size = ");

    let err = config::load_from_file(file.path()).unwrap_err();
    assert!(err.is_config());
    assert!(err.to_string().contains("TOML"));
}

#[test]
fn test_load_config_wrong_value_type() {
    let file = write_config(".json", r#"{"sync": {"page_size": "lots"}}"#);

    let err = config::load_from_file(file.path()).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_load_config_missing_file() {
    let result = config::load(Some(std::path::Path::new("/nonexistent/calmirror.toml")));
    assert!(result.is_err(), "Should fail for a missing explicit config file");
}
