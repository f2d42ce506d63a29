//! Canonical status/check reports and normalization of producer output.
//!
//! Two independently versioned producers emit status and check reports.
//! [`normalize`] accepts any of their shapes and returns one
//! [`CanonicalReport`]. Shape detection is explicit ([`detect_shape`]) and
//! each shape has its own mapping; a report that matches no shape, or whose
//! canonical entries fail to decode, is rejected as a whole.

pub mod check;
mod mapping;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Error;

/// Per-dependency status in a canonical report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DependencyState {
    Synced,
    SyncedFallback,
    Outdated,
    Missing,
    Corrupted,
    Incomplete,
    ReadError,
}

impl DependencyState {
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Synced" => Some(Self::Synced),
            "SyncedFallback" => Some(Self::SyncedFallback),
            "Outdated" => Some(Self::Outdated),
            "Missing" => Some(Self::Missing),
            "Corrupted" => Some(Self::Corrupted),
            "Incomplete" => Some(Self::Incomplete),
            "ReadError" => Some(Self::ReadError),
            _ => None,
        }
    }

    pub fn is_synced(self) -> bool {
        matches!(self, Self::Synced | Self::SyncedFallback)
    }

    /// Counted under `corrupted` in summaries.
    pub fn is_corrupted(self) -> bool {
        matches!(self, Self::Corrupted | Self::Incomplete | Self::ReadError)
    }
}

/// Aggregate counts of a report.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusSummary {
    pub total: u64,
    pub synced: u64,
    pub missing: u64,
    pub outdated: u64,
    pub corrupted: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub by_source: Option<BTreeMap<String, u64>>,
}

impl StatusSummary {
    /// Count normalized statuses.
    pub fn from_statuses(statuses: &[DependencyStatus]) -> Self {
        let mut summary = Self { total: statuses.len() as u64, ..Self::default() };
        for item in statuses {
            match item.status {
                s if s.is_synced() => summary.synced += 1,
                DependencyState::Missing => summary.missing += 1,
                DependencyState::Outdated => summary.outdated += 1,
                _ => summary.corrupted += 1,
            }
        }
        summary
    }
}

/// One dependency's line in a canonical report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyStatus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub package_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub crate_name: Option<String>,
    pub lock_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docs_version: Option<String>,
    pub status: DependencyState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_fallback: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_sync_at: Option<String>,
}

impl DependencyStatus {
    /// A status line with only the required fields set.
    pub fn new(lock_version: impl Into<String>, status: DependencyState) -> Self {
        Self {
            package_name: None,
            crate_name: None,
            lock_version: lock_version.into(),
            docs_version: None,
            status,
            reason: None,
            reason_code: None,
            source_kind: None,
            source_url: None,
            provenance_url: None,
            is_fallback: None,
            last_sync_at: None,
        }
    }

    /// Crate name for Rust producers, package name otherwise.
    pub fn name(&self) -> &str {
        self.crate_name
            .as_deref()
            .or(self.package_name.as_deref())
            .unwrap_or("unknown")
    }
}

/// The canonical report shape.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalReport {
    pub summary: StatusSummary,
    pub statuses: Vec<DependencyStatus>,
}

impl CanonicalReport {
    /// True when anything is missing, outdated or corrupted.
    pub fn has_issues(&self) -> bool {
        self.summary.missing > 0 || self.summary.outdated > 0 || self.summary.corrupted > 0
    }

    /// Fold statuses into totals and a per-source breakdown.
    pub fn metrics(&self) -> ReportMetrics {
        let mut metrics = ReportMetrics::default();
        for item in &self.statuses {
            let delta = SourceMetrics::for_state(item.status);
            metrics.totals.add(delta);
            let source = item.source_kind.clone().unwrap_or_else(|| "unknown".to_string());
            metrics.by_source.entry(source).or_default().add(delta);
        }
        metrics
    }
}

/// Counts contributed by a set of statuses.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetrics {
    pub synced: u64,
    pub skipped: u64,
    pub errors: u64,
}

impl SourceMetrics {
    fn for_state(state: DependencyState) -> Self {
        match state {
            s if s.is_synced() => Self { synced: 1, ..Self::default() },
            DependencyState::Missing => Self { skipped: 1, ..Self::default() },
            _ => Self { errors: 1, ..Self::default() },
        }
    }

    fn add(&mut self, other: Self) {
        self.synced += other.synced;
        self.skipped += other.skipped;
        self.errors += other.errors;
    }
}

/// Totals plus a per-source-kind breakdown.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReportMetrics {
    pub totals: SourceMetrics,
    pub by_source: BTreeMap<String, SourceMetrics>,
}

/// Which producer shape a raw report has.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportShape {
    /// `{summary: {...}, statuses: [...]}`
    Canonical,
    /// `{summary?, packages: [...]}`
    LegacyPackages,
    /// `{ok: bool, issues: [...]}`
    LegacyIssues,
    Unrecognized,
}

/// Classify a raw report by its documented discriminator fields only.
pub fn detect_shape(raw: &Value) -> ReportShape {
    let Some(object) = raw.as_object() else {
        return ReportShape::Unrecognized;
    };

    let has_array = |key: &str| object.get(key).is_some_and(Value::is_array);

    if object.get("summary").is_some_and(Value::is_object) && has_array("statuses") {
        ReportShape::Canonical
    } else if has_array("packages") {
        ReportShape::LegacyPackages
    } else if object.get("ok").is_some_and(Value::is_boolean) && has_array("issues") {
        ReportShape::LegacyIssues
    } else {
        ReportShape::Unrecognized
    }
}

/// Normalize a decoded status or check report into the canonical shape.
pub fn normalize(raw: &Value) -> Result<CanonicalReport, Error> {
    match detect_shape(raw) {
        ReportShape::Canonical => mapping::from_canonical(raw),
        ReportShape::LegacyPackages => Ok(mapping::from_packages(raw)),
        ReportShape::LegacyIssues => Ok(mapping::from_issues(raw)),
        ReportShape::Unrecognized => Err(Error::ReportShape(
            "expected {summary, statuses}, {packages} or {ok, issues}".to_string(),
        )),
    }
}

/// Decode JSON text and normalize it.
pub fn normalize_str(json: &str) -> Result<CanonicalReport, Error> {
    let raw: Value = serde_json::from_str(json).map_err(|e| Error::ReportShape(format!("invalid JSON: {e}")))?;
    normalize(&raw)
}
