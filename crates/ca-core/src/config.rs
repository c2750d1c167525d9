//! Configuration types and loading

use serde::{Deserialize, Serialize};

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct AppConfig {
    /// Database configuration
    pub database: DatabaseConfig,

    /// Attachment behaviour
    pub attachments: AttachmentSettings,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "postgres://localhost/attachments".to_string(),
            max_connections: 10,
            min_connections: 2,
            connect_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AttachmentSettings {
    /// Public prefix under which data thumbnails are served
    pub thumbnail_base_url: String,
    /// Pending uploads older than this are removed by cleanup
    pub unassociated_ttl_seconds: i64,
}

impl Default for AttachmentSettings {
    fn default() -> Self {
        Self {
            thumbnail_base_url: "/data/attachments".to_string(),
            unassociated_ttl_seconds: 86400, // 24 hours
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default `EnvFilter` directive when `RUST_LOG` is unset
    pub filter: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info,ca_attachments=debug,ca_db=debug".to_string(),
            json: false,
        }
    }
}

/// Configuration error
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for {key}: {message}")]
    InvalidValue { key: String, message: String },
}

impl From<ConfigError> for crate::error::CaError {
    fn from(err: ConfigError) -> Self {
        crate::error::CaError::Config(err.to_string())
    }
}

impl AppConfig {
    /// Load configuration from the process environment, reading `.env` first if present
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        // Database
        if let Some(url) = lookup("DATABASE_URL") {
            config.database.url = url;
        }
        if let Some(v) = lookup("DB_MAX_CONNECTIONS") {
            config.database.max_connections = parse_value("DB_MAX_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("DB_MIN_CONNECTIONS") {
            config.database.min_connections = parse_value("DB_MIN_CONNECTIONS", &v)?;
        }
        if let Some(v) = lookup("DB_CONNECT_TIMEOUT") {
            config.database.connect_timeout_secs = parse_value("DB_CONNECT_TIMEOUT", &v)?;
        }

        // Attachments
        if let Some(url) = lookup("ATTACHMENT_THUMBNAIL_BASE_URL") {
            config.attachments.thumbnail_base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(v) = lookup("ATTACHMENT_UNASSOCIATED_TTL") {
            let ttl: i64 = parse_value("ATTACHMENT_UNASSOCIATED_TTL", &v)?;
            if ttl < 0 {
                return Err(ConfigError::InvalidValue {
                    key: "ATTACHMENT_UNASSOCIATED_TTL".to_string(),
                    message: "must not be negative".to_string(),
                });
            }
            config.attachments.unassociated_ttl_seconds = ttl;
        }

        // Logging
        if let Some(filter) = lookup("LOG_FILTER") {
            config.logging.filter = filter;
        }
        if let Some(v) = lookup("LOG_JSON") {
            config.logging.json = v == "true" || v == "1" || v == "yes";
        }

        Ok(config)
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    raw.trim().parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: e.to_string(),
    })
}
