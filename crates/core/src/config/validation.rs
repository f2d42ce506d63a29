//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, MAX_LATEST_TTL_HOURS};
use crate::types::SyncMode;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `sync_concurrency` is 0 or exceeds 64
    /// - `http_attempts` is 0 or exceeds 10
    /// - `http_timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `output_dir` is empty
    /// - `latest_ttl_hours` exceeds ten years
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync_concurrency == 0 {
            return Err(ConfigError::Invalid {
                field: "sync_concurrency".into(),
                reason: "must be at least 1".into(),
            });
        }
        if self.sync_concurrency > 64 {
            return Err(ConfigError::Invalid { field: "sync_concurrency".into(), reason: "must not exceed 64".into() });
        }

        if self.http_attempts == 0 || self.http_attempts > 10 {
            return Err(ConfigError::Invalid { field: "http_attempts".into(), reason: "must be between 1 and 10".into() });
        }

        if self.http_timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "http_timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.http_timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "http_timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.latest_ttl_hours > MAX_LATEST_TTL_HOURS {
            return Err(ConfigError::Invalid {
                field: "latest_ttl_hours".into(),
                reason: format!("must not exceed {MAX_LATEST_TTL_HOURS} hours"),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Invalid { field: "output_dir".into(), reason: "must not be empty".into() });
        }

        if self.sync_mode == SyncMode::Hybrid {
            tracing::warn!("sync_mode = \"hybrid\" is reserved; dependencies will fail to resolve");
        }

        Ok(())
    }
}
