//! Documentation source resolution.
//!
//! Each ecosystem has an adapter turning `(name, lock version, options)`
//! into a [`ResolvedSource`]. An unavailable source is never an error: it is
//! recorded as a failed [`SourceAttempt`] and resolution moves on to the
//! next candidate, ending at the repository fallback. Only a failed
//! registry identity lookup, a registry without a usable version, a
//! reserved sync mode or cancellation produce a [`SourceError`].

pub mod crates;
pub mod github;
pub mod latest;
pub mod npm;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use fdocs_core::{AppConfig, DependencyIdentity, DocsSource, Ecosystem, SourceKind, SyncMode};

pub use crates::CratesAdapter;
pub use latest::LatestVersionCache;
pub use npm::NpmAdapter;

use crate::cancel::CancelToken;
use crate::error::{RequestError, SourceError};
use crate::net::RetryClient;

/// One candidate tried during resolution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttempt {
    pub kind: SourceKind,
    pub url: String,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl SourceAttempt {
    pub fn ok(kind: SourceKind, url: impl Into<String>) -> Self {
        Self { kind, url: url.into(), ok: true, reason: None }
    }

    pub fn failed(kind: SourceKind, url: impl Into<String>, reason: impl Into<String>) -> Self {
        Self { kind, url: url.into(), ok: false, reason: Some(reason.into()) }
    }
}

/// Best documentation location for one dependency, with the full trail of
/// candidates tried to reach it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedSource {
    pub kind: SourceKind,
    pub url: String,
    pub version: String,
    pub attempts: Vec<SourceAttempt>,
}

impl ResolvedSource {
    /// Whether the returned `url` came from a successful attempt.
    pub fn is_authoritative(&self) -> bool {
        self.attempts.last().is_some_and(|a| a.ok && a.url == self.url)
    }
}

/// Per-call resolution settings.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    pub sync_mode: SyncMode,
    pub docs_source: DocsSource,
    pub cancel: CancelToken,
}

impl ResolveOptions {
    pub fn from_config(config: &AppConfig) -> Self {
        Self { sync_mode: config.sync_mode, docs_source: config.docs_source, cancel: CancelToken::new() }
    }
}

/// Resolver for one package ecosystem.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    fn ecosystem(&self) -> Ecosystem;

    async fn resolve(&self, name: &str, lock_version: &str, options: &ResolveOptions)
    -> Result<ResolvedSource, SourceError>;
}

/// Dispatches to the adapter for a dependency's ecosystem.
#[derive(Debug, Clone)]
pub struct SourceResolver {
    rust: CratesAdapter,
    npm: NpmAdapter,
}

impl SourceResolver {
    pub fn new(client: RetryClient, latest: LatestVersionCache) -> Self {
        Self { rust: CratesAdapter::new(client.clone(), latest), npm: NpmAdapter::new(client) }
    }

    /// Reqwest-backed resolver with a system-clock reuse cache.
    pub fn from_config(config: &AppConfig) -> Result<Self, RequestError> {
        let client = RetryClient::from_config(config)?;
        let latest = LatestVersionCache::new(std::sync::Arc::new(fdocs_core::SystemClock), config.latest_ttl());
        Ok(Self::new(client, latest))
    }

    pub fn adapter(&self, ecosystem: Ecosystem) -> &dyn SourceAdapter {
        match ecosystem {
            Ecosystem::Rust => &self.rust,
            Ecosystem::Npm => &self.npm,
        }
    }

    pub async fn resolve(
        &self, identity: &DependencyIdentity, lock_version: &str, options: &ResolveOptions,
    ) -> Result<ResolvedSource, SourceError> {
        let resolved = self
            .adapter(identity.ecosystem)
            .resolve(&identity.name, lock_version, options)
            .await;

        match &resolved {
            Ok(source) => tracing::debug!(
                "resolved {} {}@{} to {} ({})",
                identity.ecosystem,
                identity.name,
                source.version,
                source.url,
                source.kind
            ),
            Err(err) => tracing::warn!("failed to resolve {} {}: {}", identity.ecosystem, identity.name, err),
        }
        resolved
    }
}

/// Reject sync modes that have no resolution behavior.
pub(crate) fn ensure_supported(mode: SyncMode) -> Result<(), SourceError> {
    match mode {
        SyncMode::Hybrid => Err(SourceError::UnsupportedSyncMode(mode)),
        SyncMode::Lockfile | SyncMode::LatestDocs => Ok(()),
    }
}

/// Percent-encode a single URL component the way registries expect.
pub(crate) fn encode_component(value: &str) -> String {
    url::form_urlencoded::byte_serialize(value.as_bytes()).collect()
}

/// Repository URL from a registry field that may be a string or `{url}`.
pub(crate) fn repository_field(value: Option<&serde_json::Value>) -> Option<String> {
    let url = match value? {
        serde_json::Value::String(url) => Some(url.clone()),
        serde_json::Value::Object(map) => map.get("url").and_then(|u| u.as_str()).map(str::to_string),
        _ => None,
    };
    url.filter(|url| !url.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_ensure_supported() {
        assert!(ensure_supported(SyncMode::Lockfile).is_ok());
        assert!(ensure_supported(SyncMode::LatestDocs).is_ok());
        assert!(matches!(ensure_supported(SyncMode::Hybrid), Err(SourceError::UnsupportedSyncMode(SyncMode::Hybrid))));
    }

    #[test]
    fn test_encode_component() {
        assert_eq!(encode_component("serde"), "serde");
        assert_eq!(encode_component("@types/node"), "%40types%2Fnode");
        assert_eq!(encode_component("lodash.merge"), "lodash.merge");
    }

    #[test]
    fn test_repository_field() {
        assert_eq!(repository_field(Some(&json!("github:a/b"))), Some("github:a/b".to_string()));
        assert_eq!(
            repository_field(Some(&json!({"type": "git", "url": "git+https://github.com/a/b.git"}))),
            Some("git+https://github.com/a/b.git".to_string())
        );
        assert_eq!(repository_field(Some(&json!({"type": "git"}))), None);
        assert_eq!(repository_field(Some(&json!(""))), None);
        assert_eq!(repository_field(Some(&json!(["x"]))), None);
        assert_eq!(repository_field(None), None);
    }

    #[test]
    fn test_authoritative() {
        let mut source = ResolvedSource {
            kind: SourceKind::RepositoryFallback,
            url: "https://github.com/search?q=x&type=repositories".into(),
            version: "1.0.0".into(),
            attempts: vec![SourceAttempt::failed(
                SourceKind::RepositoryFallback,
                "https://github.com/search?q=x&type=repositories",
                "no repository",
            )],
        };
        assert!(!source.is_authoritative());

        source.attempts = vec![SourceAttempt::ok(SourceKind::RepositoryFallback, source.url.clone())];
        assert!(source.is_authoritative());
    }

    #[test]
    fn test_attempt_serialization() {
        let attempt = SourceAttempt::ok(SourceKind::DocsSite, "https://docs.rs/crate/serde/1.0.0");
        assert_eq!(
            serde_json::to_value(&attempt).unwrap(),
            json!({"kind": "docs-site", "url": "https://docs.rs/crate/serde/1.0.0", "ok": true})
        );
    }
}
