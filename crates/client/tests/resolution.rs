use std::sync::Arc;
use std::time::Duration;

use fdocs_client::net::testing::{Scripted, ScriptedTransport};
use fdocs_client::{
    LatestVersionCache, ResolveOptions, ResolveRequest, RetryClient, RetryOptions, SourceResolver, resolve_all,
};
use fdocs_core::{DependencyIdentity, DocsSource, SourceKind, SystemClock};

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn resolver(transport: Arc<ScriptedTransport>) -> Arc<SourceResolver> {
    let client = RetryClient::new(transport, RetryOptions { base_delay: Duration::ZERO, ..RetryOptions::default() });
    let latest = LatestVersionCache::new(Arc::new(SystemClock), chrono::Duration::hours(24));
    Arc::new(SourceResolver::new(client, latest))
}

#[tokio::test]
async fn mixed_ecosystem_batch() {
    init_tracing();
    let transport = Arc::new(
        ScriptedTransport::new()
            .route("https://docs.rs/crate/serde/1.0.0", vec![Scripted::status(200)])
            .route("https://docs.rs/crate/obscure/0.1.0", vec![Scripted::status(404)])
            .route(
                "https://crates.io/api/v1/crates/obscure",
                vec![Scripted::json(r#"{"crate": {"repository": "https://github.com/someone/obscure.git"}}"#)],
            )
            .route(
                "https://registry.npmjs.org/react",
                vec![Scripted::json(
                    r#"{"dist-tags": {"latest": "18.2.0"},
                        "versions": {"18.2.0": {"dist": {"tarball": "https://registry.npmjs.org/react/-/react-18.2.0.tgz"}}}}"#,
                )],
            ),
    );

    let requests = vec![
        ResolveRequest::new(DependencyIdentity::rust("serde"), "1.0.0"),
        ResolveRequest::new(DependencyIdentity::rust("obscure"), "0.1.0"),
        ResolveRequest::new(DependencyIdentity::npm("react"), "18.2.0"),
    ];

    let options = ResolveOptions { docs_source: DocsSource::NpmTarball, ..ResolveOptions::default() };
    let mut outcomes = resolve_all(resolver(transport), requests, 2, options).await;
    outcomes.sort_by(|a, b| a.request.identity.name.cmp(&b.request.identity.name));

    let resolved: Vec<_> = outcomes
        .iter()
        .map(|o| {
            let source = o.result.as_ref().unwrap();
            (o.request.identity.name.as_str(), source.kind, source.url.as_str())
        })
        .collect();

    assert_eq!(
        resolved,
        vec![
            ("obscure", SourceKind::Mixed, "https://github.com/someone/obscure/tree/HEAD"),
            ("react", SourceKind::RegistryTarball, "https://registry.npmjs.org/react/-/react-18.2.0.tgz"),
            ("serde", SourceKind::DocsSite, "https://docs.rs/crate/serde/1.0.0"),
        ]
    );

    let obscure = outcomes[0].result.as_ref().unwrap();
    assert_eq!(obscure.attempts.len(), 2);
    assert!(obscure.is_authoritative());
}
