//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use crate::store::is_valid_table_name;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `database_url` is not `sqlite://<path>` or `sqlite::memory:`
    /// - `collection_name` is not a plain SQL identifier
    /// - `request_timeout_secs` is outside 1-60
    /// - `user_agent` is empty
    /// - `max_redirects` exceeds 20
    /// - `bind_addr` is not a socket address
    /// - `connect_max_retries` is 0 or `connect_retry_delay_secs` exceeds 60
    /// - `worker_concurrency` is outside 1-64 or `queue_capacity` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.store_target()?;

        if !is_valid_table_name(&self.collection_name) {
            return Err(invalid("collection_name", "must contain only ASCII letters, digits and underscores"));
        }

        if !(1..=60).contains(&self.request_timeout_secs) {
            return Err(invalid("request_timeout_secs", "must be between 1 and 60 seconds"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.max_redirects > 20 {
            return Err(invalid("max_redirects", "must not exceed 20"));
        }

        self.socket_addr()?;

        if self.connect_max_retries == 0 {
            return Err(invalid("connect_max_retries", "must be at least 1"));
        }
        if self.connect_retry_delay_secs > 60 {
            return Err(invalid("connect_retry_delay_secs", "must not exceed 60 seconds"));
        }

        if !(1..=64).contains(&self.worker_concurrency) {
            return Err(invalid("worker_concurrency", "must be between 1 and 64"));
        }
        if self.queue_capacity == 0 {
            return Err(invalid("queue_capacity", "must be greater than 0"));
        }

        if self.max_redirects == 0 {
            tracing::warn!("max_redirects is 0; redirect responses are stored as returned, not followed");
        }

        Ok(())
    }
}
