//! npm adapter: registry tarball first, repository fallback second.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use fdocs_core::{DocsSource, Ecosystem, SourceKind};

use super::github::resolve_repository_fallback;
use super::{ResolveOptions, ResolvedSource, SourceAdapter, SourceAttempt, encode_component, repository_field};
use crate::error::SourceError;
use crate::net::RetryClient;

const NPM_REGISTRY: &str = "https://registry.npmjs.org/";

#[derive(Debug, Default, Deserialize)]
struct PackageDocument {
    #[serde(rename = "dist-tags", default)]
    dist_tags: HashMap<String, Value>,
    #[serde(default)]
    versions: HashMap<String, VersionDocument>,
    #[serde(default)]
    repository: Option<Value>,
}

#[derive(Debug, Default, Deserialize)]
struct VersionDocument {
    #[serde(default)]
    dist: Option<Value>,
    #[serde(default)]
    repository: Option<Value>,
}

impl PackageDocument {
    /// The lock version when the registry has it, else the `latest` tag.
    fn select_version(&self, lock_version: &str) -> String {
        if self.versions.contains_key(lock_version) {
            return lock_version.to_string();
        }
        self.dist_tags
            .get("latest")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .unwrap_or(lock_version)
            .to_string()
    }
}

pub fn registry_url(name: &str) -> String {
    format!("{NPM_REGISTRY}{}", encode_component(name))
}

/// Resolves npm packages against the registry.
#[derive(Debug, Clone)]
pub struct NpmAdapter {
    client: RetryClient,
}

impl NpmAdapter {
    pub fn new(client: RetryClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SourceAdapter for NpmAdapter {
    fn ecosystem(&self) -> Ecosystem {
        Ecosystem::Npm
    }

    async fn resolve(
        &self, name: &str, lock_version: &str, options: &ResolveOptions,
    ) -> Result<ResolvedSource, SourceError> {
        super::ensure_supported(options.sync_mode)?;

        let registry = registry_url(name);
        let document: PackageDocument = self
            .client
            .get_json(&registry, &options.cancel)
            .await
            .map_err(|e| SourceError::request(name, e))?;

        let version = document.select_version(lock_version);
        let entry = document.versions.get(&version);
        let tarball = entry
            .and_then(|v| v.dist.as_ref())
            .and_then(|d| d.get("tarball"))
            .and_then(Value::as_str)
            .filter(|t| !t.is_empty());
        let repository = repository_field(entry.and_then(|v| v.repository.as_ref()))
            .or_else(|| repository_field(document.repository.as_ref()));

        let mut attempts = vec![SourceAttempt::ok(SourceKind::Mixed, registry.clone())];

        if options.docs_source == DocsSource::NpmTarball {
            if let Some(tarball) = tarball {
                attempts.push(SourceAttempt::ok(SourceKind::RegistryTarball, tarball));
                return Ok(ResolvedSource {
                    kind: SourceKind::RegistryTarball,
                    url: tarball.to_string(),
                    version,
                    attempts,
                });
            }
            tracing::debug!("no tarball URL for {}@{}", name, version);
            attempts.push(SourceAttempt::failed(
                SourceKind::RegistryTarball,
                registry,
                format!("Tarball URL is missing for {name}@{version}"),
            ));
        }

        let fallback = resolve_repository_fallback(name, &version, repository.as_deref());
        attempts.extend(fallback.attempts);

        let kind = match options.docs_source {
            DocsSource::Github => SourceKind::Repository,
            DocsSource::NpmTarball => SourceKind::Mixed,
        };
        Ok(ResolvedSource { kind, url: fallback.url, version, attempts })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RequestErrorKind;
    use crate::net::RetryOptions;
    use crate::net::testing::{Scripted, ScriptedTransport};
    use fdocs_core::SyncMode;
    use std::sync::Arc;
    use std::time::Duration;

    fn adapter(transport: &Arc<ScriptedTransport>) -> NpmAdapter {
        let options = RetryOptions { base_delay: Duration::ZERO, ..RetryOptions::default() };
        NpmAdapter::new(RetryClient::new(transport.clone(), options))
    }

    const REACT: &str = r#"{
        "dist-tags": {"latest": "18.3.1"},
        "versions": {
            "18.2.0": {"dist": {"tarball": "https://registry.npmjs.org/react/-/react-18.2.0.tgz"},
                       "repository": {"type": "git", "url": "git+https://github.com/facebook/react.git"}},
            "18.3.1": {"dist": {"tarball": "https://registry.npmjs.org/react/-/react-18.3.1.tgz"}}
        },
        "repository": "github:facebook/react"
    }"#;

    fn react_transport() -> Arc<ScriptedTransport> {
        Arc::new(ScriptedTransport::new().route("https://registry.npmjs.org/react", vec![Scripted::json(REACT)]))
    }

    #[tokio::test]
    async fn test_tarball_for_lock_version() {
        let transport = react_transport();
        let source = adapter(&transport).resolve("react", "18.2.0", &ResolveOptions::default()).await.unwrap();

        assert_eq!(source.kind, SourceKind::RegistryTarball);
        assert_eq!(source.url, "https://registry.npmjs.org/react/-/react-18.2.0.tgz");
        assert_eq!(source.version, "18.2.0");
        assert_eq!(
            source.attempts,
            vec![
                SourceAttempt::ok(SourceKind::Mixed, "https://registry.npmjs.org/react"),
                SourceAttempt::ok(SourceKind::RegistryTarball, "https://registry.npmjs.org/react/-/react-18.2.0.tgz"),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_lock_version_uses_latest_tag() {
        let transport = react_transport();
        let source = adapter(&transport).resolve("react", "0.0.0-gone", &ResolveOptions::default()).await.unwrap();
        assert_eq!(source.version, "18.3.1");
        assert_eq!(source.url, "https://registry.npmjs.org/react/-/react-18.3.1.tgz");
    }

    #[tokio::test]
    async fn test_github_preference_skips_tarball() {
        let transport = react_transport();
        let options = ResolveOptions { docs_source: DocsSource::Github, ..ResolveOptions::default() };
        let source = adapter(&transport).resolve("react", "18.2.0", &options).await.unwrap();

        assert_eq!(source.kind, SourceKind::Repository);
        assert_eq!(source.url, "https://github.com/facebook/react/tree/HEAD");
        assert_eq!(source.attempts.len(), 2);
        assert!(source.attempts.iter().all(|a| a.kind != SourceKind::RegistryTarball));
    }

    #[tokio::test]
    async fn test_missing_tarball_falls_back_to_package_repository() {
        let transport = Arc::new(ScriptedTransport::new().route(
            "https://registry.npmjs.org/left-pad",
            vec![Scripted::json(
                r#"{"dist-tags": {"latest": "1.3.0"}, "versions": {"1.3.0": {}},
                    "repository": {"url": "git@github.com:stevemao/left-pad.git"}}"#,
            )],
        ));
        let source = adapter(&transport).resolve("left-pad", "1.3.0", &ResolveOptions::default()).await.unwrap();

        assert_eq!(source.kind, SourceKind::Mixed);
        assert_eq!(source.url, "https://github.com/stevemao/left-pad/tree/HEAD");
        let kinds: Vec<_> = source.attempts.iter().map(|a| (a.kind, a.ok)).collect();
        assert_eq!(
            kinds,
            vec![
                (SourceKind::Mixed, true),
                (SourceKind::RegistryTarball, false),
                (SourceKind::RepositoryFallback, true)
            ]
        );
        assert_eq!(source.attempts[1].reason.as_deref(), Some("Tarball URL is missing for left-pad@1.3.0"));
    }

    #[tokio::test]
    async fn test_scoped_package_url_and_search_fallback() {
        let transport = Arc::new(ScriptedTransport::new().route(
            "https://registry.npmjs.org/%40scope%2Fpkg",
            vec![Scripted::json(r#"{"versions": {"1.0.0": {}}}"#)],
        ));
        let source = adapter(&transport).resolve("@scope/pkg", "1.0.0", &ResolveOptions::default()).await.unwrap();

        assert_eq!(source.url, "https://github.com/search?q=%40scope%2Fpkg&type=repositories");
        assert!(!source.is_authoritative());
        assert_eq!(source.attempts.len(), 3);
    }

    #[tokio::test]
    async fn test_registry_lookup_failure() {
        let transport = Arc::new(
            ScriptedTransport::new().route("https://registry.npmjs.org/private", vec![Scripted::status(401)]),
        );
        let err = adapter(&transport).resolve("private", "1.0.0", &ResolveOptions::default()).await.unwrap_err();
        match err {
            SourceError::Request { source, .. } => assert_eq!(source.kind(), Some(RequestErrorKind::Auth)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hybrid_rejected() {
        let transport = react_transport();
        let options = ResolveOptions { sync_mode: SyncMode::Hybrid, ..ResolveOptions::default() };
        let err = adapter(&transport).resolve("react", "18.2.0", &options).await.unwrap_err();
        assert!(matches!(err, SourceError::UnsupportedSyncMode(_)));
    }
}
