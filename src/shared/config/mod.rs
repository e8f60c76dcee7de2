//! Live service configuration
//!
//! [`LiveConfig`] is assembled by [`LiveConfigBuilder`] from, in order of
//! increasing precedence: built-in defaults, an optional TOML file, and
//! environment variables.
//!
//! | Variable                    | Default           |
//! |-----------------------------|-------------------|
//! | `MONGODB_URI`               | unset (no feed)   |
//! | `MONGODB_DATABASE`          | `RoadRescue`      |
//! | `WATCH_COLLECTION`          | `users`           |
//! | `ROOM_PREFIX`               | `serviceRequests` |
//! | `CATALOG_PREFIX`            | `services`        |
//! | `DISPLAY_NAME_FIELD`        | `name`            |
//! | `OWNER_FIELD`               | `_id`             |
//! | `PORT`                      | `3000`            |
//! | `BACKOFF_BASE_MS`           | `1000`            |
//! | `BACKOFF_CAP_MS`            | `10000`           |
//! | `MAX_RECONNECT_ATTEMPTS`    | `5`               |
//! | `SUBSCRIBER_QUEUE_CAPACITY` | `64`              |
//!
//! `ROADRESCUE_CONFIG` names the TOML file; its keys are the lowercase
//! variable names (`mongodb_uri`, `backoff_cap_ms`, ...).

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::shared::change::path_under;

/// Environment variable naming the optional TOML config file
pub const CONFIG_FILE_VAR: &str = "ROADRESCUE_CONFIG";

const DEFAULT_DATABASE: &str = "RoadRescue";
const DEFAULT_COLLECTION: &str = "users";
const DEFAULT_ROOM_PREFIX: &str = "serviceRequests";
const DEFAULT_CATALOG_PREFIX: &str = "services";
const DEFAULT_DISPLAY_NAME_FIELD: &str = "name";
const DEFAULT_OWNER_FIELD: &str = "_id";
const DEFAULT_PORT: u16 = 3000;
const DEFAULT_BACKOFF_BASE_MS: u64 = 1_000;
const DEFAULT_BACKOFF_CAP_MS: u64 = 10_000;
const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Live service configuration
#[derive(Debug, Clone, PartialEq)]
pub struct LiveConfig {
    /// Store connection string; without it the feed never starts
    pub mongodb_uri: Option<String>,
    pub database: String,
    /// Collection whose change feed is watched
    pub collection: String,
    /// Field-path prefix of room-scoped records
    pub room_prefix: String,
    /// Field-path prefix of catalog entries
    pub catalog_prefix: String,
    pub display_name_field: String,
    /// Field of the watched document that names its owner's room
    pub owner_field: String,
    pub port: u16,
    pub backoff_base: Duration,
    pub backoff_cap: Duration,
    /// Consecutive failed connects tolerated before degrading
    pub max_reconnect_attempts: u32,
    /// Pending notifications buffered per subscriber
    pub subscriber_queue_capacity: usize,
}

impl Default for LiveConfig {
    fn default() -> Self {
        Self {
            mongodb_uri: None,
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            room_prefix: DEFAULT_ROOM_PREFIX.to_string(),
            catalog_prefix: DEFAULT_CATALOG_PREFIX.to_string(),
            display_name_field: DEFAULT_DISPLAY_NAME_FIELD.to_string(),
            owner_field: DEFAULT_OWNER_FIELD.to_string(),
            port: DEFAULT_PORT,
            backoff_base: Duration::from_millis(DEFAULT_BACKOFF_BASE_MS),
            backoff_cap: Duration::from_millis(DEFAULT_BACKOFF_CAP_MS),
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            subscriber_queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

impl LiveConfig {
    /// Create a new LiveConfigBuilder
    pub fn builder() -> LiveConfigBuilder {
        LiveConfigBuilder::default()
    }

    /// Load from the config file named by `ROADRESCUE_CONFIG` (if any) and
    /// the process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        let mut builder = Self::builder();
        if let Ok(path) = std::env::var(CONFIG_FILE_VAR) {
            builder = builder.merge_file(path)?;
        }
        builder.merge_vars(|key| std::env::var(key).ok())?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.database.is_empty() {
            return Err(ConfigError::MissingValue("database"));
        }
        if self.collection.is_empty() {
            return Err(ConfigError::MissingValue("collection"));
        }
        if self.room_prefix.is_empty() {
            return Err(ConfigError::MissingValue("room_prefix"));
        }
        if self.catalog_prefix.is_empty() {
            return Err(ConfigError::MissingValue("catalog_prefix"));
        }
        if self.owner_field.is_empty() {
            return Err(ConfigError::MissingValue("owner_field"));
        }
        if path_under(&self.room_prefix, &self.catalog_prefix)
            || path_under(&self.catalog_prefix, &self.room_prefix)
        {
            return Err(ConfigError::OverlappingPrefixes {
                room: self.room_prefix.clone(),
                catalog: self.catalog_prefix.clone(),
            });
        }
        if self.backoff_base.is_zero() || self.backoff_cap < self.backoff_base {
            return Err(ConfigError::InvalidBackoff {
                base_ms: self.backoff_base.as_millis() as u64,
                cap_ms: self.backoff_cap.as_millis() as u64,
            });
        }
        if self.max_reconnect_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                key: "max_reconnect_attempts",
                value: "0".to_string(),
            });
        }
        if self.subscriber_queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "subscriber_queue_capacity",
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}

/// Keys accepted in the TOML config file
#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    mongodb_uri: Option<String>,
    mongodb_database: Option<String>,
    watch_collection: Option<String>,
    room_prefix: Option<String>,
    catalog_prefix: Option<String>,
    display_name_field: Option<String>,
    owner_field: Option<String>,
    port: Option<u16>,
    backoff_base_ms: Option<u64>,
    backoff_cap_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
    subscriber_queue_capacity: Option<usize>,
}

/// Builder for LiveConfig
#[derive(Debug, Default)]
pub struct LiveConfigBuilder {
    mongodb_uri: Option<String>,
    database: Option<String>,
    collection: Option<String>,
    room_prefix: Option<String>,
    catalog_prefix: Option<String>,
    display_name_field: Option<String>,
    owner_field: Option<String>,
    port: Option<u16>,
    backoff_base_ms: Option<u64>,
    backoff_cap_ms: Option<u64>,
    max_reconnect_attempts: Option<u32>,
    subscriber_queue_capacity: Option<usize>,
}

impl LiveConfigBuilder {
    pub fn mongodb_uri(mut self, uri: impl Into<String>) -> Self {
        self.mongodb_uri = Some(uri.into());
        self
    }

    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    pub fn room_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.room_prefix = Some(prefix.into());
        self
    }

    pub fn catalog_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.catalog_prefix = Some(prefix.into());
        self
    }

    pub fn display_name_field(mut self, field: impl Into<String>) -> Self {
        self.display_name_field = Some(field.into());
        self
    }

    pub fn owner_field(mut self, field: impl Into<String>) -> Self {
        self.owner_field = Some(field.into());
        self
    }

    pub fn port(mut self, port: u16) -> Self {
        self.port = Some(port);
        self
    }

    pub fn backoff(mut self, base: Duration, cap: Duration) -> Self {
        self.backoff_base_ms = Some(base.as_millis() as u64);
        self.backoff_cap_ms = Some(cap.as_millis() as u64);
        self
    }

    pub fn max_reconnect_attempts(mut self, attempts: u32) -> Self {
        self.max_reconnect_attempts = Some(attempts);
        self
    }

    pub fn subscriber_queue_capacity(mut self, capacity: usize) -> Self {
        self.subscriber_queue_capacity = Some(capacity);
        self
    }

    /// Overlay values from a TOML file
    pub fn merge_file(self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        self.merge_toml(&contents)
    }

    /// Overlay values from TOML text
    pub fn merge_toml(mut self, contents: &str) -> Result<Self, ConfigError> {
        let file: FileConfig =
            toml::from_str(contents).map_err(|e| ConfigError::Parse(e.to_string()))?;

        self.mongodb_uri = file.mongodb_uri.or(self.mongodb_uri);
        self.database = file.mongodb_database.or(self.database);
        self.collection = file.watch_collection.or(self.collection);
        self.room_prefix = file.room_prefix.or(self.room_prefix);
        self.catalog_prefix = file.catalog_prefix.or(self.catalog_prefix);
        self.display_name_field = file.display_name_field.or(self.display_name_field);
        self.owner_field = file.owner_field.or(self.owner_field);
        self.port = file.port.or(self.port);
        self.backoff_base_ms = file.backoff_base_ms.or(self.backoff_base_ms);
        self.backoff_cap_ms = file.backoff_cap_ms.or(self.backoff_cap_ms);
        self.max_reconnect_attempts = file.max_reconnect_attempts.or(self.max_reconnect_attempts);
        self.subscriber_queue_capacity =
            file.subscriber_queue_capacity.or(self.subscriber_queue_capacity);
        Ok(self)
    }

    /// Overlay values from environment-style variables
    pub fn merge_vars<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(uri) = text("MONGODB_URI") {
            self.mongodb_uri = Some(uri);
        }
        if let Some(database) = text("MONGODB_DATABASE") {
            self.database = Some(database);
        }
        if let Some(collection) = text("WATCH_COLLECTION") {
            self.collection = Some(collection);
        }
        if let Some(prefix) = text("ROOM_PREFIX") {
            self.room_prefix = Some(prefix);
        }
        if let Some(prefix) = text("CATALOG_PREFIX") {
            self.catalog_prefix = Some(prefix);
        }
        if let Some(field) = text("DISPLAY_NAME_FIELD") {
            self.display_name_field = Some(field);
        }
        if let Some(field) = text("OWNER_FIELD") {
            self.owner_field = Some(field);
        }
        if let Some(port) = text("PORT") {
            self.port = Some(parse_var("PORT", &port)?);
        }
        if let Some(base) = text("BACKOFF_BASE_MS") {
            self.backoff_base_ms = Some(parse_var("BACKOFF_BASE_MS", &base)?);
        }
        if let Some(cap) = text("BACKOFF_CAP_MS") {
            self.backoff_cap_ms = Some(parse_var("BACKOFF_CAP_MS", &cap)?);
        }
        if let Some(attempts) = text("MAX_RECONNECT_ATTEMPTS") {
            self.max_reconnect_attempts = Some(parse_var("MAX_RECONNECT_ATTEMPTS", &attempts)?);
        }
        if let Some(capacity) = text("SUBSCRIBER_QUEUE_CAPACITY") {
            self.subscriber_queue_capacity =
                Some(parse_var("SUBSCRIBER_QUEUE_CAPACITY", &capacity)?);
        }
        Ok(self)
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<LiveConfig, ConfigError> {
        let defaults = LiveConfig::default();
        let config = LiveConfig {
            mongodb_uri: self.mongodb_uri,
            database: self.database.unwrap_or(defaults.database),
            collection: self.collection.unwrap_or(defaults.collection),
            room_prefix: self.room_prefix.unwrap_or(defaults.room_prefix),
            catalog_prefix: self.catalog_prefix.unwrap_or(defaults.catalog_prefix),
            display_name_field: self.display_name_field.unwrap_or(defaults.display_name_field),
            owner_field: self.owner_field.unwrap_or(defaults.owner_field),
            port: self.port.unwrap_or(defaults.port),
            backoff_base: self
                .backoff_base_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_base),
            backoff_cap: self
                .backoff_cap_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.backoff_cap),
            max_reconnect_attempts: self
                .max_reconnect_attempts
                .unwrap_or(defaults.max_reconnect_attempts),
            subscriber_queue_capacity: self
                .subscriber_queue_capacity
                .unwrap_or(defaults.subscriber_queue_capacity),
        };
        config.validate()?;
        Ok(config)
    }
}

fn parse_var<T: std::str::FromStr>(key: &'static str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: value.to_string(),
    })
}

/// Configuration errors
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("missing value: {0}")]
    MissingValue(&'static str),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("room prefix {room:?} and catalog prefix {catalog:?} overlap")]
    OverlappingPrefixes { room: String, catalog: String },
    #[error("backoff cap ({cap_ms}ms) must be at least the non-zero base ({base_ms}ms)")]
    InvalidBackoff { base_ms: u64, cap_ms: u64 },
    #[error("failed to read {path}: {message}")]
    Io { path: String, message: String },
    #[error("invalid config file: {0}")]
    Parse(String),
}
