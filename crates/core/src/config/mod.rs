//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (FDOCS_*)
//! 2. TOML config file (if FDOCS_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

use crate::store::StoreOptions;
use crate::types::{DocsSource, Ecosystem, SyncMode};

mod validation;

pub use validation::ConfigError;

/// Upper bound on `latest_ttl_hours` (ten years).
pub const MAX_LATEST_TTL_HOURS: u64 = 24 * 365 * 10;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (FDOCS_*)
/// 2. TOML config file (if FDOCS_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Root of the on-disk docs cache.
    ///
    /// Set via FDOCS_OUTPUT_DIR environment variable.
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Which version of each dependency to document.
    ///
    /// Set via FDOCS_SYNC_MODE environment variable.
    #[serde(default)]
    pub sync_mode: SyncMode,

    /// Preferred npm documentation source.
    ///
    /// Set via FDOCS_DOCS_SOURCE environment variable.
    #[serde(default)]
    pub docs_source: DocsSource,

    /// Reuse window for newest-version lookups and latest-docs snapshots.
    ///
    /// Set via FDOCS_LATEST_TTL_HOURS environment variable.
    #[serde(default = "default_latest_ttl_hours")]
    pub latest_ttl_hours: u64,

    /// Maximum number of dependencies resolved concurrently.
    ///
    /// Set via FDOCS_SYNC_CONCURRENCY environment variable.
    #[serde(default = "default_sync_concurrency")]
    pub sync_concurrency: usize,

    /// Per-file size cap in KiB applied when a snapshot is written.
    ///
    /// Set via FDOCS_MAX_FILE_SIZE_KB environment variable.
    #[serde(default = "default_max_file_size_kb")]
    pub max_file_size_kb: usize,

    /// Total HTTP attempts per request, including the first.
    ///
    /// Set via FDOCS_HTTP_ATTEMPTS environment variable.
    #[serde(default = "default_http_attempts")]
    pub http_attempts: u32,

    /// Base backoff delay in milliseconds.
    ///
    /// Set via FDOCS_HTTP_BASE_DELAY_MS environment variable.
    #[serde(default = "default_http_base_delay_ms")]
    pub http_base_delay_ms: u64,

    /// Per-attempt HTTP timeout in milliseconds.
    ///
    /// Set via FDOCS_HTTP_TIMEOUT_MS environment variable.
    #[serde(default = "default_http_timeout_ms")]
    pub http_timeout_ms: u64,

    /// Maximum number of redirect hops followed per attempt.
    ///
    /// Set via FDOCS_MAX_REDIRECTS environment variable.
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via FDOCS_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("fdocs")
}

fn default_latest_ttl_hours() -> u64 {
    24
}

fn default_sync_concurrency() -> usize {
    8
}

fn default_max_file_size_kb() -> usize {
    200
}

fn default_http_attempts() -> u32 {
    3
}

fn default_http_base_delay_ms() -> u64 {
    250
}

fn default_http_timeout_ms() -> u64 {
    30_000
}

fn default_max_redirects() -> usize {
    3
}

fn default_user_agent() -> String {
    concat!("ai-fdocs/", env!("CARGO_PKG_VERSION")).into()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            sync_mode: SyncMode::default(),
            docs_source: DocsSource::default(),
            latest_ttl_hours: default_latest_ttl_hours(),
            sync_concurrency: default_sync_concurrency(),
            max_file_size_kb: default_max_file_size_kb(),
            http_attempts: default_http_attempts(),
            http_base_delay_ms: default_http_base_delay_ms(),
            http_timeout_ms: default_http_timeout_ms(),
            max_redirects: default_max_redirects(),
            user_agent: default_user_agent(),
        }
    }
}

impl AppConfig {
    /// Per-attempt timeout as Duration for use with reqwest/tokio.
    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    pub fn http_base_delay(&self) -> Duration {
        Duration::from_millis(self.http_base_delay_ms)
    }

    /// TTL for newest-version reuse and latest-docs snapshots.
    pub fn latest_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.latest_ttl_hours.min(MAX_LATEST_TTL_HOURS) as i64)
    }

    /// Snapshot TTL to apply on update: only latest-docs snapshots expire.
    pub fn snapshot_ttl(&self) -> Option<chrono::Duration> {
        match self.sync_mode {
            SyncMode::LatestDocs if self.latest_ttl_hours > 0 => Some(self.latest_ttl()),
            _ => None,
        }
    }

    /// Cache root for one ecosystem, relative to `project_root`.
    pub fn store_root(&self, project_root: &Path, ecosystem: Ecosystem) -> PathBuf {
        project_root.join(&self.output_dir).join(ecosystem.as_dir())
    }

    pub fn store_options(&self) -> StoreOptions {
        StoreOptions { max_file_size_kb: Some(self.max_file_size_kb).filter(|kb| *kb > 0) }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `FDOCS_`
    /// 2. TOML file from `FDOCS_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("FDOCS_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("FDOCS_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        Self::extract(figment)
    }

    /// Load configuration from a TOML file layered over defaults, without
    /// consulting the environment.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let figment = Figment::from(Serialized::defaults(Self::default())).merge(Toml::file(path.as_ref()));
        Self::extract(figment)
    }

    fn extract(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
