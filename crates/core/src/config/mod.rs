//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (URLMETA_*)
//! 2. TOML config file (if URLMETA_CONFIG_FILE set)
//! 3. Built-in defaults

use std::net::SocketAddr;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::store::{RetryPolicy, StoreTarget};

mod validation;

pub use validation::ConfigError;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (URLMETA_*)
/// 2. TOML config file (if URLMETA_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Store connection string: `sqlite://<path>` or `sqlite::memory:`.
    ///
    /// Set via URLMETA_DATABASE_URL environment variable.
    #[serde(default = "default_database_url")]
    pub database_url: String,

    /// Table holding the metadata records.
    ///
    /// Set via URLMETA_COLLECTION_NAME environment variable.
    #[serde(default = "default_collection_name")]
    pub collection_name: String,

    /// Per-fetch timeout in seconds (1-60).
    ///
    /// Set via URLMETA_REQUEST_TIMEOUT_SECS environment variable.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// User-Agent string for outbound requests.
    ///
    /// Set via URLMETA_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Maximum number of redirects followed per fetch.
    ///
    /// Set via URLMETA_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Address the HTTP server listens on.
    ///
    /// Set via URLMETA_BIND_ADDR environment variable.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Connection attempts made at startup before giving up.
    ///
    /// Set via URLMETA_CONNECT_MAX_RETRIES environment variable.
    #[serde(default = "default_connect_max_retries")]
    pub connect_max_retries: u32,

    /// Seconds to wait between connection attempts.
    ///
    /// Set via URLMETA_CONNECT_RETRY_DELAY_SECS environment variable.
    #[serde(default = "default_connect_retry_delay_secs")]
    pub connect_retry_delay_secs: u64,

    /// Deferred collections allowed to run at once.
    ///
    /// Set via URLMETA_WORKER_CONCURRENCY environment variable.
    #[serde(default = "default_worker_concurrency")]
    pub worker_concurrency: usize,

    /// Deferred collections that may wait in the queue.
    ///
    /// Set via URLMETA_QUEUE_CAPACITY environment variable.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_database_url() -> String {
    "sqlite://./urlmeta.sqlite".into()
}

fn default_collection_name() -> String {
    "url_metadata".into()
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_user_agent() -> String {
    "urlmeta/0.1".into()
}

fn default_max_redirects() -> usize {
    10
}

fn default_bind_addr() -> String {
    "0.0.0.0:8000".into()
}

fn default_connect_max_retries() -> u32 {
    5
}

fn default_connect_retry_delay_secs() -> u64 {
    2
}

fn default_worker_concurrency() -> usize {
    4
}

fn default_queue_capacity() -> usize {
    1024
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
            collection_name: default_collection_name(),
            request_timeout_secs: default_request_timeout_secs(),
            user_agent: default_user_agent(),
            max_redirects: default_max_redirects(),
            bind_addr: default_bind_addr(),
            connect_max_retries: default_connect_max_retries(),
            connect_retry_delay_secs: default_connect_retry_delay_secs(),
            worker_concurrency: default_worker_concurrency(),
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl AppConfig {
    /// Fetch timeout as Duration for use with reqwest.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Startup connection retry schedule.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.connect_max_retries,
            delay: Duration::from_secs(self.connect_retry_delay_secs),
        }
    }

    /// Parsed store target.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `database_url` is not a supported connection string.
    pub fn store_target(&self) -> Result<StoreTarget, ConfigError> {
        StoreTarget::parse(&self.database_url)
            .map_err(|e| ConfigError::Invalid { field: "database_url".into(), reason: e.to_string() })
    }

    /// Parsed listen address.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `bind_addr` is not a socket address.
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind_addr.parse().map_err(|e: std::net::AddrParseError| ConfigError::Invalid {
            field: "bind_addr".into(),
            reason: e.to_string(),
        })
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `URLMETA_`
    /// 2. TOML file from `URLMETA_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment())
    }

    /// The layered figment `load` extracts from.
    pub fn figment() -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("URLMETA_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment.merge(Env::prefixed("URLMETA_").map(|key| key.as_str().to_lowercase().into()))
    }

    /// Extract and validate a configuration from an arbitrary figment.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::LoadFailed` on extraction failure and
    /// `ConfigError::Invalid` when validation rejects a value.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
