use std::env;
use std::time::Duration;

use crate::error::ShipperError;

const DEFAULT_BATCH_SIZE: usize = 500;
const DEFAULT_FLUSH_INTERVAL_MS: u64 = 5_000;
const DEFAULT_MAX_MEMORY_MIB: usize = 100;
const DEFAULT_RETRY_DELAY_MS: u64 = 1_000;
const DEFAULT_SHUTDOWN_TIMEOUT_MS: u64 = 30_000;

/// Fallback collection (and database) name when the caller provides none.
pub const DEFAULT_COLLECTION: &str = "logs";

/// Pool and timeout overrides handed to the driver when connecting.
#[derive(Debug, Clone)]
pub struct ConnectionOptions {
    /// Maximum connections in the driver pool.
    pub max_pool_size: u32,
    /// Minimum connections kept warm in the pool.
    pub min_pool_size: u32,
    /// How long an idle pooled connection may live.
    pub idle_timeout: Duration,
    /// How long the driver may spend selecting a reachable server.
    pub server_selection_timeout: Duration,
    /// Socket-level timeout for individual operations.
    pub socket_timeout: Duration,
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        Self {
            max_pool_size: 10,
            min_pool_size: 2,
            idle_timeout: Duration::from_secs(30),
            server_selection_timeout: Duration::from_secs(5),
            socket_timeout: Duration::from_secs(45),
        }
    }
}

/// Shipper configuration.
///
/// Built programmatically from [`Config::new`] or from the environment via
/// [`Config::from_env`]. All fields besides `uri` carry defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Connection string. The database name is derived from its path
    /// segment, falling back to [`DEFAULT_COLLECTION`].
    pub uri: String,
    /// Destination collection for entries that do not name one.
    pub default_collection: String,
    /// Entries per collection batch before a size-triggered flush.
    pub batch_size: usize,
    /// Period of the flush timer, and the staleness threshold a batch must
    /// reach before the timer flushes it.
    pub flush_interval: Duration,
    /// Cap, in bytes, on the estimated size of all staged entries across
    /// every collection. Reaching it forces a flush.
    pub max_memory_usage: usize,
    /// Base delay for the exponential backoff applied to collections whose
    /// last flush failed transiently.
    pub retry_delay: Duration,
    /// Driver pool overrides.
    pub connection_options: ConnectionOptions,
    /// Upper bound on the shutdown drain.
    pub graceful_shutdown_timeout: Duration,
}

impl Config {
    /// Create a configuration with defaults for everything but the URI.
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            default_collection: DEFAULT_COLLECTION.to_string(),
            batch_size: DEFAULT_BATCH_SIZE,
            flush_interval: Duration::from_millis(DEFAULT_FLUSH_INTERVAL_MS),
            max_memory_usage: DEFAULT_MAX_MEMORY_MIB * 1024 * 1024,
            retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
            connection_options: ConnectionOptions::default(),
            graceful_shutdown_timeout: Duration::from_millis(DEFAULT_SHUTDOWN_TIMEOUT_MS),
        }
    }

    /// Create a configuration from `LOGSHIP_*` environment variables.
    ///
    /// `LOGSHIP_URI` is required. Numeric variables that fail to parse fall
    /// back to their defaults; values that parse but are out of range are
    /// rejected by [`Config::validate`].
    pub fn from_env() -> Result<Self, ShipperError> {
        let uri = env::var("LOGSHIP_URI")
            .map_err(|_| ShipperError::InvalidConfig("LOGSHIP_URI is not set".to_string()))?;

        let mut config = Self::new(uri);
        if let Ok(collection) = env::var("LOGSHIP_DEFAULT_COLLECTION") {
            config.default_collection = collection;
        }
        config.batch_size = parse_env("LOGSHIP_BATCH_SIZE", config.batch_size);
        config.flush_interval = Duration::from_millis(parse_env(
            "LOGSHIP_FLUSH_INTERVAL_MS",
            config.flush_interval.as_millis() as u64,
        ));
        config.max_memory_usage =
            parse_env("LOGSHIP_MAX_MEMORY_MB", DEFAULT_MAX_MEMORY_MIB) * 1024 * 1024;
        config.retry_delay = Duration::from_millis(parse_env(
            "LOGSHIP_RETRY_DELAY_MS",
            config.retry_delay.as_millis() as u64,
        ));
        config.graceful_shutdown_timeout = Duration::from_millis(parse_env(
            "LOGSHIP_SHUTDOWN_TIMEOUT_MS",
            config.graceful_shutdown_timeout.as_millis() as u64,
        ));

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration. Fatal at startup per the error policy.
    pub fn validate(&self) -> Result<(), ShipperError> {
        if self.uri.trim().is_empty() {
            return Err(ShipperError::InvalidConfig(
                "connection URI cannot be empty".to_string(),
            ));
        }
        if self.default_collection.trim().is_empty() {
            return Err(ShipperError::InvalidConfig(
                "default collection cannot be empty".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(ShipperError::InvalidConfig(
                "batch size must be greater than 0".to_string(),
            ));
        }
        if self.flush_interval.is_zero() {
            return Err(ShipperError::InvalidConfig(
                "flush interval must be greater than 0".to_string(),
            ));
        }
        if self.max_memory_usage == 0 {
            return Err(ShipperError::InvalidConfig(
                "max memory usage must be greater than 0".to_string(),
            ));
        }
        Ok(())
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}
