//! Configuration loading tests
//!
//! These mutate the process environment, so they run serially.

use serial_test::serial;
use std::io::Write;
use std::time::Duration;

use roadrescue_live::shared::config::CONFIG_FILE_VAR;
use roadrescue_live::shared::{ConfigError, LiveConfig};

const VARS: &[&str] = &[
    CONFIG_FILE_VAR,
    "MONGODB_URI",
    "MONGODB_DATABASE",
    "WATCH_COLLECTION",
    "ROOM_PREFIX",
    "CATALOG_PREFIX",
    "DISPLAY_NAME_FIELD",
    "OWNER_FIELD",
    "PORT",
    "BACKOFF_BASE_MS",
    "BACKOFF_CAP_MS",
    "MAX_RECONNECT_ATTEMPTS",
    "SUBSCRIBER_QUEUE_CAPACITY",
];

fn clear_env() {
    for var in VARS {
        std::env::remove_var(var);
    }
}

#[test]
#[serial]
fn test_from_env_defaults() {
    clear_env();
    let config = LiveConfig::from_env().unwrap();
    assert_eq!(config, LiveConfig::default());
}

#[test]
#[serial]
fn test_from_env_reads_variables() {
    clear_env();
    std::env::set_var("MONGODB_URI", "mongodb://localhost:27017/?replicaSet=rs0");
    std::env::set_var("BACKOFF_BASE_MS", "250");
    std::env::set_var("BACKOFF_CAP_MS", "2000");
    std::env::set_var("OWNER_FIELD", "providerId");

    let config = LiveConfig::from_env().unwrap();
    clear_env();

    assert_eq!(
        config.mongodb_uri.as_deref(),
        Some("mongodb://localhost:27017/?replicaSet=rs0")
    );
    assert_eq!(config.backoff_base, Duration::from_millis(250));
    assert_eq!(config.backoff_cap, Duration::from_secs(2));
    assert_eq!(config.owner_field, "providerId");
}

#[test]
#[serial]
fn test_from_env_layers_file_under_variables() {
    clear_env();
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "mongodb_database = \"Staging\"\nmax_reconnect_attempts = 8\nport = 4100"
    )
    .unwrap();
    std::env::set_var(CONFIG_FILE_VAR, file.path());
    std::env::set_var("PORT", "4200");

    let config = LiveConfig::from_env().unwrap();
    clear_env();

    assert_eq!(config.database, "Staging");
    assert_eq!(config.max_reconnect_attempts, 8);
    assert_eq!(config.port, 4200);
}

#[test]
#[serial]
fn test_from_env_missing_file() {
    clear_env();
    std::env::set_var(CONFIG_FILE_VAR, "/nonexistent/roadrescue.toml");

    let result = LiveConfig::from_env();
    clear_env();

    assert!(matches!(result, Err(ConfigError::Io { .. })));
}

#[test]
#[serial]
fn test_from_env_rejects_zero_attempts() {
    clear_env();
    std::env::set_var("MAX_RECONNECT_ATTEMPTS", "0");

    let result = LiveConfig::from_env();
    clear_env();

    assert!(matches!(
        result,
        Err(ConfigError::InvalidValue { key: "max_reconnect_attempts", .. })
    ));
}
