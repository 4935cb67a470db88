//! Typed configuration from environment variables.
//!
//! Loads once at startup, fails fast if required vars are missing or
//! malformed. The database URL is wrapped in `SecretString` so it never
//! lands in logs.

use crate::error::{Error, Result};
use secrecy::SecretString;
use std::str::FromStr;
use std::time::Duration;

#[derive(Debug)]
pub struct Config {
    pub database_url: SecretString,
    pub otel_endpoint: Option<String>,
    pub log_level: String,
    /// Age after which cached daily buckets are no longer consulted.
    pub cache_retention_days: i64,
    /// Default confidence threshold for low-confidence alerts.
    pub alert_threshold: f64,
    /// Keep-alive interval for idle notification channels.
    pub heartbeat_interval: Duration,
    /// Per-subscriber channel capacity.
    pub subscriber_buffer: usize,
    /// Rows per bulk insert statement.
    pub ingest_chunk_size: usize,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// In local dev, call `dotenvy::dotenv().ok()` before this.
    pub fn from_env() -> Result<Self> {
        let alert_threshold: f64 = optional_var("ALERT_THRESHOLD", 0.75)?;
        if !(0.0..=1.0).contains(&alert_threshold) {
            return Err(Error::Config(format!(
                "ALERT_THRESHOLD must be within [0, 1], got {alert_threshold}"
            )));
        }

        let heartbeat_secs: u64 = optional_var("HEARTBEAT_INTERVAL_SECS", 30)?;
        if heartbeat_secs == 0 {
            return Err(Error::Config(
                "HEARTBEAT_INTERVAL_SECS must be at least 1".to_string(),
            ));
        }

        Ok(Self {
            database_url: SecretString::from(required_var("DATABASE_URL")?),
            otel_endpoint: std::env::var("OTEL_ENDPOINT").ok(),
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            cache_retention_days: optional_var("CACHE_RETENTION_DAYS", 90)?,
            alert_threshold,
            heartbeat_interval: Duration::from_secs(heartbeat_secs),
            subscriber_buffer: optional_var("SUBSCRIBER_BUFFER", 64)?,
            ingest_chunk_size: optional_var::<usize>("INGEST_CHUNK_SIZE", 500)?.max(1),
        })
    }
}

fn required_var(name: &str) -> Result<String> {
    std::env::var(name)
        .map_err(|_| Error::Config(format!("required environment variable {name} is not set")))
}

fn optional_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map_err(|e| Error::Config(format!("{name}={raw:?} is invalid: {e}"))),
        Err(_) => Ok(default),
    }
}
