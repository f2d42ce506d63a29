//! Per-shape mappings into the canonical report.

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use super::{CanonicalReport, DependencyState, DependencyStatus, StatusSummary};
use crate::Error;

type Object = Map<String, Value>;

/// Canonical input: entries must decode exactly, totals are optional.
pub(super) fn from_canonical(raw: &Value) -> Result<CanonicalReport, Error> {
    let statuses_raw = raw.get("statuses").cloned().unwrap_or(Value::Array(Vec::new()));
    let statuses: Vec<DependencyStatus> = serde_json::from_value(statuses_raw)
        .map_err(|e| Error::ReportShape(format!("invalid canonical status entry: {e}")))?;

    let summary = build_summary(raw.get("summary").and_then(Value::as_object), &statuses);
    Ok(CanonicalReport { summary, statuses })
}

/// Status producer emitting `{summary, packages: [{name, lockVersion, ...}]}`.
pub(super) fn from_packages(raw: &Value) -> CanonicalReport {
    let statuses: Vec<DependencyStatus> = raw
        .get("packages")
        .and_then(Value::as_array)
        .map(|packages| packages.iter().map(map_package).collect())
        .unwrap_or_default();

    let summary = build_summary(raw.get("summary").and_then(Value::as_object), &statuses);
    CanonicalReport { summary, statuses }
}

/// Check producer emitting `{ok, issues: [{name, kind}]}`.
pub(super) fn from_issues(raw: &Value) -> CanonicalReport {
    let statuses: Vec<DependencyStatus> = raw
        .get("issues")
        .and_then(Value::as_array)
        .map(|issues| issues.iter().map(map_issue).collect())
        .unwrap_or_default();

    let summary = build_summary(raw.get("summary").and_then(Value::as_object), &statuses);
    CanonicalReport { summary, statuses }
}

fn map_package(raw: &Value) -> DependencyStatus {
    let pkg = raw.as_object();
    let text = |key: &str| pkg.and_then(|p| p.get(key)).and_then(Value::as_str).map(str::to_string);

    let status = text("status")
        .as_deref()
        .and_then(DependencyState::parse)
        .unwrap_or(DependencyState::Corrupted);

    DependencyStatus {
        package_name: text("name"),
        crate_name: None,
        lock_version: text("lockVersion").unwrap_or_else(|| "unknown".to_string()),
        docs_version: text("docsVersion"),
        status,
        reason: text("reason"),
        reason_code: text("reasonCode"),
        source_kind: text("sourceKind"),
        source_url: text("sourceUrl"),
        provenance_url: text("provenanceUrl"),
        is_fallback: Some(pkg.and_then(|p| p.get("isFallback")).is_some_and(truthy)),
        last_sync_at: text("lastSyncAt"),
    }
}

fn map_issue(raw: &Value) -> DependencyStatus {
    let issue = raw.as_object();
    let name = issue
        .and_then(|i| i.get("name"))
        .and_then(Value::as_str)
        .map(str::to_string);
    let kind = issue
        .and_then(|i| i.get("kind"))
        .and_then(Value::as_str)
        .map(str::to_string);

    let status = match kind.as_deref() {
        Some("missing") | Some("not_in_lockfile") => DependencyState::Missing,
        _ => DependencyState::Outdated,
    };
    let display = name.as_deref().unwrap_or("unknown");
    let reason = match kind.as_deref() {
        Some("missing") => format!("{display}: docs missing"),
        Some("not_in_lockfile") => format!("{display}: not in lockfile"),
        _ => format!("{display}: outdated (config changed or TTL expired)"),
    };

    DependencyStatus {
        package_name: name,
        reason: Some(reason),
        reason_code: kind,
        ..DependencyStatus::new("unknown", status)
    }
}

/// Use producer-supplied totals where present, recount the rest.
fn build_summary(raw: Option<&Object>, statuses: &[DependencyStatus]) -> StatusSummary {
    let counted = StatusSummary::from_statuses(statuses);
    let field = |key: &str| raw.and_then(|s| s.get(key)).and_then(to_count);

    let problems = raw.and_then(|s| s.get("problems")).and_then(Value::as_object);
    let problem = |key: &str| problems.and_then(|p| p.get(key)).and_then(to_count);
    let problem_corrupted = problems.map(|_| {
        problem("corrupted").unwrap_or(0)
            + problem("incomplete").unwrap_or(0)
            + problem("readError").or_else(|| problem("read_error")).unwrap_or(0)
    });

    StatusSummary {
        total: field("total").unwrap_or(counted.total),
        synced: field("synced").unwrap_or(counted.synced),
        missing: field("missing").or_else(|| problem("missing")).unwrap_or(counted.missing),
        outdated: field("outdated").or_else(|| problem("outdated")).unwrap_or(counted.outdated),
        corrupted: field("corrupted").or(problem_corrupted).unwrap_or(counted.corrupted),
        by_source: by_source(raw),
    }
}

fn by_source(raw: Option<&Object>) -> Option<BTreeMap<String, u64>> {
    let map = raw.and_then(|s| s.get("by_source")).and_then(Value::as_object)?;
    let normalized: BTreeMap<String, u64> = map
        .iter()
        .filter_map(|(key, value)| to_count(value).map(|n| (key.clone(), n)))
        .collect();
    (!normalized.is_empty()).then_some(normalized)
}

/// Non-negative integral count from a JSON number or numeric string.
fn to_count(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => {
            let trimmed = s.trim();
            trimmed
                .parse::<u64>()
                .ok()
                .or_else(|| trimmed.parse::<f64>().ok().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64))
        }
        _ => None,
    }
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Null => false,
        Value::Array(_) | Value::Object(_) => true,
    }
}
