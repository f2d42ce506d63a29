//! Check report built from the artifact store's freshness decision.

use chrono::Duration;

use super::{CanonicalReport, DependencyState, DependencyStatus, StatusSummary};
use crate::store::{ArtifactStore, RefreshReason, SnapshotKey, UpdateOptions};
use crate::types::SyncMode;

/// What the caller expects to be cached for one configured dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Expectation {
    pub name: String,
    /// Target version; `None` when it could not be determined.
    pub lock_version: Option<String>,
    pub fingerprint: String,
    pub config_hash: String,
}

#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    pub sync_mode: SyncMode,
    pub ttl: Option<Duration>,
}

/// Build a canonical check report for `expectations`, in input order.
pub async fn build_check_report(
    store: &ArtifactStore, expectations: &[Expectation], options: &CheckOptions,
) -> CanonicalReport {
    let update_options = UpdateOptions { force: false, ttl: options.ttl };
    let mut statuses = Vec::with_capacity(expectations.len());

    for expected in expectations {
        let Some(version) = expected.lock_version.clone() else {
            let code = match options.sync_mode {
                SyncMode::LatestDocs => "missing",
                _ => "not_in_lockfile",
            };
            statuses.push(issue(&expected.name, "unknown", DependencyState::Missing, code));
            continue;
        };

        let key = SnapshotKey {
            name: expected.name.clone(),
            version: version.clone(),
            fingerprint: expected.fingerprint.clone(),
            config_hash: expected.config_hash.clone(),
        };

        let status = match store.needs_refresh(&key, &update_options).await {
            Some(RefreshReason::Missing) => issue(&expected.name, &version, DependencyState::Missing, "missing"),
            Some(reason) => {
                tracing::debug!(package = %expected.name, reason = reason.as_str(), "snapshot is outdated");
                DependencyStatus {
                    docs_version: Some(version.clone()),
                    ..issue(&expected.name, &version, DependencyState::Outdated, "config_changed")
                }
            }
            None => {
                let meta = store.read_meta(&expected.name, &version).await;
                let is_fallback = meta.as_ref().is_some_and(|m| m.is_fallback);
                DependencyStatus {
                    package_name: Some(expected.name.clone()),
                    docs_version: Some(version.clone()),
                    reason: Some("ok".to_string()),
                    reason_code: Some("ok".to_string()),
                    source_url: meta.as_ref().and_then(|m| m.source_ref.clone()),
                    is_fallback: Some(is_fallback),
                    last_sync_at: meta.map(|m| m.fetched_at),
                    ..DependencyStatus::new(
                        version,
                        if is_fallback { DependencyState::SyncedFallback } else { DependencyState::Synced },
                    )
                }
            }
        };
        statuses.push(status);
    }

    CanonicalReport { summary: StatusSummary::from_statuses(&statuses), statuses }
}

fn issue(name: &str, lock_version: &str, state: DependencyState, code: &str) -> DependencyStatus {
    let reason = match code {
        "missing" => format!("{name}: docs missing"),
        "not_in_lockfile" => format!("{name}: not in lockfile"),
        _ => format!("{name}: outdated (config changed or TTL expired)"),
    };
    DependencyStatus {
        package_name: Some(name.to_string()),
        reason: Some(reason),
        reason_code: Some(code.to_string()),
        ..DependencyStatus::new(lock_version, state)
    }
}
