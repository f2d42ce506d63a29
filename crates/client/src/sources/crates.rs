//! Rust adapter: docs.rs first, repository fallback second.

use async_trait::async_trait;
use serde::Deserialize;

use fdocs_core::{Ecosystem, SourceKind, SyncMode};

use super::github::resolve_repository_fallback;
use super::{LatestVersionCache, ResolveOptions, ResolvedSource, SourceAdapter, SourceAttempt, encode_component};
use crate::cancel::CancelToken;
use crate::error::{RequestError, SourceError};
use crate::net::{HttpMethod, RetryClient};

const CRATES_API: &str = "https://crates.io/api/v1/crates/";
const DOCS_RS: &str = "https://docs.rs/crate/";

#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(rename = "crate")]
    krate: CrateInfo,
}

#[derive(Debug, Default, Deserialize)]
struct CrateInfo {
    #[serde(default)]
    max_stable_version: Option<String>,
    #[serde(default)]
    max_version: Option<String>,
    #[serde(default)]
    repository: Option<String>,
}

pub fn crate_info_url(name: &str) -> String {
    format!("{CRATES_API}{}", encode_component(name))
}

pub fn docs_rs_url(name: &str, version: &str) -> String {
    format!("{DOCS_RS}{}/{}", encode_component(name), encode_component(version))
}

/// Resolves crates against docs.rs.
///
/// In latest-docs mode the target version is the newest stable release
/// (newest release when none is stable), reused through the
/// [`LatestVersionCache`].
#[derive(Debug, Clone)]
pub struct CratesAdapter {
    client: RetryClient,
    latest: LatestVersionCache,
}

impl CratesAdapter {
    pub fn new(client: RetryClient, latest: LatestVersionCache) -> Self {
        Self { client, latest }
    }

    pub fn latest_cache(&self) -> &LatestVersionCache {
        &self.latest
    }

    async fn crate_info(&self, name: &str, cancel: &CancelToken) -> Result<CrateInfo, SourceError> {
        let response: CrateResponse = self
            .client
            .get_json(&crate_info_url(name), cancel)
            .await
            .map_err(|e| SourceError::request(name, e))?;
        Ok(response.krate)
    }

    /// Newest version plus the repository URL when a lookup was needed.
    async fn resolve_latest(&self, name: &str, cancel: &CancelToken) -> Result<(String, Option<String>), SourceError> {
        if let Some(version) = self.latest.get(name).await {
            return Ok((version, None));
        }

        let info = self.crate_info(name, cancel).await?;
        let version = info
            .max_stable_version
            .filter(|v| !v.is_empty())
            .or_else(|| info.max_version.filter(|v| !v.is_empty()))
            .ok_or_else(|| SourceError::NoVersion(name.to_string()))?;

        self.latest.insert(name, &version).await;
        Ok((version, info.repository))
    }

    /// HEAD request; any 2xx means the docs page exists.
    async fn check_docs_site(&self, url: &str, cancel: &CancelToken) -> Result<bool, RequestError> {
        let response = self.client.request(url, HttpMethod::Head, cancel).await?;
        Ok(response.is_success())
    }
}

#[async_trait]
impl SourceAdapter for CratesAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Rust
    }

    async fn resolve(
        &self, name: &str, lock_version: &str, options: &ResolveOptions,
    ) -> Result<ResolvedSource, SourceError> {
        super::ensure_supported(options.sync_mode)?;
        let cancel = &options.cancel;

        let (version, mut repository) = match options.sync_mode {
            SyncMode::LatestDocs => self.resolve_latest(name, cancel).await?,
            _ => (lock_version.to_string(), None),
        };

        let docs_url = docs_rs_url(name, &version);
        let mut attempts = Vec::new();
        match self.check_docs_site(&docs_url, cancel).await {
            Ok(true) => {
                attempts.push(SourceAttempt::ok(SourceKind::DocsSite, docs_url.clone()));
                return Ok(ResolvedSource { kind: SourceKind::DocsSite, url: docs_url, version, attempts });
            }
            Ok(false) => {
                tracing::debug!("docs.rs has no page for {}@{}", name, version);
                attempts.push(SourceAttempt::failed(SourceKind::DocsSite, docs_url, "docs.rs page is unavailable"));
            }
            Err(RequestError::Cancelled) => return Err(SourceError::Cancelled),
            Err(err) => {
                tracing::debug!("docs.rs check failed for {}@{}: {}", name, version, err);
                attempts.push(SourceAttempt::failed(SourceKind::DocsSite, docs_url, err.to_string()));
            }
        }

        if repository.is_none() {
            repository = self.crate_info(name, cancel).await?.repository;
        }

        let fallback = resolve_repository_fallback(name, &version, repository.as_deref());
        attempts.extend(fallback.attempts);

        Ok(ResolvedSource { kind: SourceKind::Mixed, url: fallback.url, version, attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::RetryOptions;
    use crate::net::testing::{Scripted, ScriptedTransport};
    use chrono::{DateTime, Duration, Utc};
    use fdocs_core::ManualClock;
    use std::sync::Arc;
    use std::time::Duration as StdDuration;

    fn adapter(transport: &Arc<ScriptedTransport>) -> (CratesAdapter, Arc<ManualClock>) {
        let start = DateTime::parse_from_rfc3339("2024-06-01T00:00:00Z").unwrap().with_timezone(&Utc);
        let clock = Arc::new(ManualClock::new(start));
        let options = RetryOptions { base_delay: StdDuration::ZERO, ..RetryOptions::default() };
        let client = RetryClient::new(transport.clone(), options);
        (CratesAdapter::new(client, LatestVersionCache::new(clock.clone(), Duration::hours(24))), clock)
    }

    fn latest_docs() -> ResolveOptions {
        ResolveOptions { sync_mode: SyncMode::LatestDocs, ..ResolveOptions::default() }
    }

    const SERDE_INFO: &str = r#"{"crate": {"max_stable_version": "1.0.210", "max_version": "1.1.0-beta",
        "repository": "https://github.com/serde-rs/serde"}}"#;

    #[tokio::test]
    async fn test_lockfile_docs_site_available() {
        let transport = Arc::new(
            ScriptedTransport::new().route("https://docs.rs/crate/serde/1.0.0", vec![Scripted::status(200)]),
        );
        let (adapter, _) = adapter(&transport);

        let source = adapter.resolve("serde", "1.0.0", &ResolveOptions::default()).await.unwrap();
        assert_eq!(source.kind, SourceKind::DocsSite);
        assert_eq!(source.url, "https://docs.rs/crate/serde/1.0.0");
        assert_eq!(source.version, "1.0.0");
        assert_eq!(source.attempts, vec![SourceAttempt::ok(SourceKind::DocsSite, "https://docs.rs/crate/serde/1.0.0")]);
        assert_eq!(transport.calls(), vec![(HttpMethod::Head, "https://docs.rs/crate/serde/1.0.0".to_string())]);
    }

    #[tokio::test]
    async fn test_unavailable_docs_site_falls_back_to_repository() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("https://docs.rs/crate/serde/1.0.0", vec![Scripted::status(404)])
                .route("https://crates.io/api/v1/crates/serde", vec![Scripted::json(SERDE_INFO)]),
        );
        let (adapter, _) = adapter(&transport);

        let source = adapter.resolve("serde", "1.0.0", &ResolveOptions::default()).await.unwrap();
        assert_eq!(source.kind, SourceKind::Mixed);
        assert_eq!(source.url, "https://github.com/serde-rs/serde/tree/HEAD");
        assert_eq!(source.version, "1.0.0");
        assert_eq!(source.attempts.len(), 2);
        assert_eq!(source.attempts[0].kind, SourceKind::DocsSite);
        assert!(!source.attempts[0].ok);
        assert_eq!(source.attempts[0].reason.as_deref(), Some("docs.rs page is unavailable"));
        assert_eq!(source.attempts[1].kind, SourceKind::RepositoryFallback);
        assert!(source.attempts[1].ok);
    }

    #[tokio::test]
    async fn test_docs_site_error_recorded_as_attempt() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(
                    "https://docs.rs/crate/tiny/0.1.0",
                    vec![Scripted::Fail(RequestError::network("connection refused"))],
                )
                .route("https://crates.io/api/v1/crates/tiny", vec![Scripted::json(r#"{"crate": {}}"#)]),
        );
        let (adapter, _) = adapter(&transport);

        let source = adapter.resolve("tiny", "0.1.0", &ResolveOptions::default()).await.unwrap();
        assert_eq!(source.attempts.len(), 2);
        assert!(source.attempts[0].reason.as_deref().unwrap().contains("connection refused"));
        assert_eq!(source.url, "https://github.com/search?q=tiny&type=repositories");
        assert!(!source.is_authoritative());
    }

    #[tokio::test]
    async fn test_latest_docs_uses_stable_and_reuses_cache() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("https://crates.io/api/v1/crates/serde", vec![Scripted::json(SERDE_INFO)])
                .route("https://docs.rs/crate/serde/1.0.210", vec![Scripted::status(200)]),
        );
        let (adapter, clock) = adapter(&transport);

        let source = adapter.resolve("serde", "1.0.0", &latest_docs()).await.unwrap();
        assert_eq!(source.version, "1.0.210");
        assert_eq!(source.kind, SourceKind::DocsSite);

        adapter.resolve("serde", "1.0.0", &latest_docs()).await.unwrap();
        assert_eq!(transport.call_count("https://crates.io/api/v1/crates/serde"), 1);

        clock.advance(Duration::hours(25));
        adapter.resolve("serde", "1.0.0", &latest_docs()).await.unwrap();
        assert_eq!(transport.call_count("https://crates.io/api/v1/crates/serde"), 2);
    }

    #[tokio::test]
    async fn test_latest_docs_without_stable_uses_max_version() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route(
                    "https://crates.io/api/v1/crates/pre",
                    vec![Scripted::json(r#"{"crate": {"max_stable_version": null, "max_version": "0.1.0-alpha"}}"#)],
                )
                .route("https://docs.rs/crate/pre/0.1.0-alpha", vec![Scripted::status(200)]),
        );
        let (adapter, _) = adapter(&transport);

        let source = adapter.resolve("pre", "0.0.1", &latest_docs()).await.unwrap();
        assert_eq!(source.version, "0.1.0-alpha");
    }

    #[tokio::test]
    async fn test_latest_docs_without_any_version_fails() {
        let transport = Arc::new(
            ScriptedTransport::new().route("https://crates.io/api/v1/crates/empty", vec![Scripted::json(r#"{"crate": {}}"#)]),
        );
        let (adapter, _) = adapter(&transport);

        let err = adapter.resolve("empty", "1.0.0", &latest_docs()).await.unwrap_err();
        assert!(matches!(err, SourceError::NoVersion(name) if name == "empty"));
    }

    #[tokio::test]
    async fn test_registry_failure_is_hard_error() {
        let transport = Arc::new(
            ScriptedTransport::new()
                .route("https://docs.rs/crate/gone/1.0.0", vec![Scripted::status(404)])
                .route("https://crates.io/api/v1/crates/gone", vec![Scripted::status(404)]),
        );
        let (adapter, _) = adapter(&transport);

        let err = adapter.resolve("gone", "1.0.0", &ResolveOptions::default()).await.unwrap_err();
        match err {
            SourceError::Request { package, source } => {
                assert_eq!(package, "gone");
                assert_eq!(source.http_status(), Some(404));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hybrid_rejected() {
        let transport = Arc::new(ScriptedTransport::new());
        let (adapter, _) = adapter(&transport);
        let options = ResolveOptions { sync_mode: SyncMode::Hybrid, ..ResolveOptions::default() };

        let err = adapter.resolve("serde", "1.0.0", &options).await.unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedSyncMode(SyncMode::Hybrid)));
        assert!(transport.calls().is_empty());
    }
}
