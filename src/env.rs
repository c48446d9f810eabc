//! Environment variable names and helpers for configuring the pipeline
//! and its collaborators from a service process.
//!
//! These are purely helpers; the core types remain decoupled from
//! environment access.

use crate::claims::auth::AuthConfig;
use crate::init::ShipperConfig;
#[cfg(feature = "loki")]
use crate::loki::LokiConfig;
use std::str::FromStr;
use std::time::Duration;

/// Loki host name, e.g. `loki`.
pub const LOKI_HOST_ENV: &str = "LOKI_HOST";

/// Loki HTTP port.
pub const LOKI_PORT_ENV: &str = "LOKI_PORT";

/// Optional Loki tenant, sent as `X-Scope-OrgID`.
pub const LOKI_TENANT_ID_ENV: &str = "LOKI_TENANT_ID";

/// Value of the `application` label.
pub const LOG_SHIPPER_APPLICATION_ENV: &str = "LOG_SHIPPER_APPLICATION";

/// Number of pending streams that triggers a push.
pub const LOG_SHIPPER_THRESHOLD_ENV: &str = "LOG_SHIPPER_THRESHOLD";

/// Capacity of the queue between producers and the shipping worker.
pub const LOG_SHIPPER_CHANNEL_BUFFER_ENV: &str = "LOG_SHIPPER_CHANNEL_BUFFER";

/// Periodic flush interval in milliseconds.
pub const LOG_SHIPPER_FLUSH_INTERVAL_MS_ENV: &str = "LOG_SHIPPER_FLUSH_INTERVAL_MS";

/// HMAC secret for signing tokens.
pub const SECRET_KEY_ENV: &str = "SECRET_KEY";

pub const ACCESS_TOKEN_EXPIRE_MINUTES_ENV: &str = "ACCESS_TOKEN_EXPIRE_MINUTES";

pub const REFRESH_TOKEN_EXPIRE_DAYS_ENV: &str = "REFRESH_TOKEN_EXPIRE_DAYS";

/// Error returned when an environment variable holds an unusable value.
#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value {value:?} for {key}")]
    Invalid { key: String, value: String },
}

/// Read an environment variable or fall back to a provided default.
pub fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Read and parse an environment variable, falling back to `default` when
/// it is unset.
pub fn env_parse<T: FromStr>(key: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(value) => value.trim().parse().map_err(|_| ConfigError::Invalid {
            key: key.to_string(),
            value,
        }),
        Err(_) => Ok(default),
    }
}

#[cfg(feature = "loki")]
impl LokiConfig {
    /// Build from `LOKI_HOST`, `LOKI_PORT` and `LOKI_TENANT_ID`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let host = env_or(LOKI_HOST_ENV, "localhost");
        let port: u16 = env_parse(LOKI_PORT_ENV, 3100)?;
        let mut config = LokiConfig::from_host_port(&host, port);
        config.tenant_id = std::env::var(LOKI_TENANT_ID_ENV).ok().filter(|t| !t.is_empty());
        Ok(config)
    }
}

impl ShipperConfig {
    /// Build from the `LOG_SHIPPER_*` variables, defaulting anything unset.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = ShipperConfig::default();
        Ok(ShipperConfig {
            application: env_or(LOG_SHIPPER_APPLICATION_ENV, &defaults.application),
            threshold: env_parse(LOG_SHIPPER_THRESHOLD_ENV, defaults.threshold)?,
            channel_buffer: env_parse(LOG_SHIPPER_CHANNEL_BUFFER_ENV, defaults.channel_buffer)?,
            flush_interval: Duration::from_millis(env_parse(
                LOG_SHIPPER_FLUSH_INTERVAL_MS_ENV,
                defaults.flush_interval.as_millis() as u64,
            )?),
            ..defaults
        })
    }
}

impl AuthConfig {
    /// Build from `SECRET_KEY` and the token lifetime variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = AuthConfig::default();
        Ok(AuthConfig {
            secret: env_or(SECRET_KEY_ENV, &defaults.secret),
            access_ttl: chrono::Duration::minutes(env_parse(
                ACCESS_TOKEN_EXPIRE_MINUTES_ENV,
                defaults.access_ttl.num_minutes(),
            )?),
            refresh_ttl: chrono::Duration::days(env_parse(
                REFRESH_TOKEN_EXPIRE_DAYS_ENV,
                defaults.refresh_ttl.num_days(),
            )?),
        })
    }
}
