use envconfig::Envconfig;
use std::net::SocketAddr;
use std::time::Duration;

use crate::error::ApiError;

#[derive(Debug, Envconfig, Clone)]
pub struct Config {
    /// Server bind address
    #[envconfig(from = "BIND_ADDR", default = "127.0.0.1:3000")]
    pub bind_addr: SocketAddr,

    /// Remote document store base URL
    #[envconfig(from = "STORE_URL", default = "")]
    pub store_url: String,

    /// Storage namespace path inside the remote store
    #[envconfig(from = "STORE_HIDDEN_PATH", default = "")]
    pub store_hidden_path: String,

    /// Salt mixed into identity hashing
    #[envconfig(from = "HASH_SALT", default = "")]
    pub hash_salt: String,

    /// API key required for administrative endpoints
    #[envconfig(from = "ADMIN_KEY", default = "")]
    pub admin_key: String,

    /// Redis connection URL; empty selects the in-memory counter backend
    #[envconfig(from = "REDIS_URL", default = "")]
    pub redis_url: String,

    /// Minimum seconds between requests from one identity
    #[envconfig(from = "RATE_LIMIT_INTERVAL_SECS", default = "1")]
    pub rate_limit_interval_secs: u64,

    /// Maximum write requests per identity per quota window
    #[envconfig(from = "MAX_DAILY_WRITES", default = "20")]
    pub max_daily_writes: u32,

    /// Quota window length in days
    #[envconfig(from = "WINDOW_PURGE_DAYS", default = "1")]
    pub window_purge_days: u64,

    /// Remote store call timeout in milliseconds
    #[envconfig(from = "STORE_TIMEOUT_MS", default = "6000")]
    pub store_timeout_ms: u64,

    /// Maximum number of entries the registry will accept
    #[envconfig(from = "STORE_ENTRIES_LIMIT", default = "1000")]
    pub store_entries_limit: usize,

    /// Length of the derived short key, in hex characters
    #[envconfig(from = "SHORT_KEY_LENGTH", default = "14")]
    pub short_key_length: usize,

    /// Maximum accepted long URL length
    #[envconfig(from = "MAX_URL_LENGTH", default = "2000")]
    pub max_url_length: usize,

    /// Default tracing level
    #[envconfig(from = "LOG_LEVEL", default = "info")]
    pub log_level: String,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        Config::init_from_env()
    }

    /// Checks that the credentials every request depends on are present.
    ///
    /// The service still starts without them; each request is then refused
    /// with a configuration error rather than running with the admission
    /// gate disabled.
    pub fn check_credentials(&self) -> Result<(), ApiError> {
        if self.store_url.is_empty()
            || self.store_hidden_path.is_empty()
            || self.hash_salt.is_empty()
            || self.admin_key.is_empty()
        {
            return Err(ApiError::Configuration(
                "credentials are missing, check the environment or .env file".to_string(),
            ));
        }
        Ok(())
    }

    /// Validates the numeric tunables against their minimum sane values.
    pub fn check_tunables(&self) -> Result<(), ApiError> {
        let out_of_range = self.rate_limit_interval_secs < 1
            || self.max_daily_writes < 1
            || self.window_purge_days < 1
            || self.store_timeout_ms < 1000
            || self.store_entries_limit < 50
            || self.short_key_length < 10
            || self.short_key_length > 64
            || self.max_url_length < 100;

        if out_of_range {
            return Err(ApiError::Configuration(
                "a tunable is below its minimum supported value".to_string(),
            ));
        }
        Ok(())
    }

    pub fn rate_limit_interval(&self) -> Duration {
        Duration::from_secs(self.rate_limit_interval_secs)
    }

    pub fn quota_window(&self) -> Duration {
        Duration::from_secs(self.window_purge_days * 24 * 60 * 60)
    }

    pub fn store_timeout(&self) -> Duration {
        Duration::from_millis(self.store_timeout_ms)
    }
}
