//! Snapshot metadata record and its TOML codec.
//!
//! The record is a flat `key = value` document stored next to each
//! snapshot as `.aifd-meta.toml`. Missing fields fall back to defaults and
//! unknown keys are ignored, so older and newer writers can share a cache.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::Error;

/// File name of the metadata record inside a snapshot directory.
pub const META_FILE_NAME: &str = ".aifd-meta.toml";

/// Current metadata schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// Persisted metadata for one cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    #[serde(default)]
    pub package_name: String,
    #[serde(default)]
    pub version: String,
    /// RFC 3339 timestamp of the fetch that produced the snapshot.
    #[serde(default)]
    pub fetched_at: String,
    #[serde(default)]
    pub fingerprint: String,
    #[serde(default)]
    pub config_hash: String,
    #[serde(default)]
    pub is_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_ref: Option<String>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl ArtifactMeta {
    /// Parsed `fetched_at`, or `None` if it is absent or malformed.
    pub fn fetched_at_utc(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        chrono::DateTime::parse_from_rfc3339(&self.fetched_at)
            .ok()
            .map(|t| t.with_timezone(&chrono::Utc))
    }
}

/// Encode a metadata record.
pub fn serialize(meta: &ArtifactMeta) -> Result<String, Error> {
    Ok(toml::to_string(meta)?)
}

/// Decode a metadata record.
///
/// Trailing lines that are not TOML (hand-added notes, a truncated append)
/// do not discard the record: the longest leading run of lines that parses
/// and carries a `version` key is used instead. Input with no such run is
/// rejected with the original parse error.
pub fn parse(raw: &str) -> Result<ArtifactMeta, Error> {
    match toml::from_str(raw) {
        Ok(meta) => Ok(meta),
        Err(strict) => match parse_leading_record(raw) {
            Some(meta) => {
                tracing::debug!(error = %strict, "recovered metadata from leading lines");
                Ok(meta)
            }
            None => Err(Error::MetaParse(strict)),
        },
    }
}

fn parse_leading_record(raw: &str) -> Option<ArtifactMeta> {
    let lines: Vec<&str> = raw.lines().collect();
    (1..lines.len()).rev().find_map(|end| {
        let table: toml::Table = toml::from_str(&lines[..end].join("\n")).ok()?;
        if !table.contains_key("version") {
            return None;
        }
        toml::Value::Table(table).try_into().ok()
    })
}

/// Read the metadata of a snapshot directory.
///
/// Absent, unreadable and unparseable records all yield `None`; the
/// freshness check treats every one of them as a missing snapshot.
pub async fn read(package_dir: &Path) -> Option<ArtifactMeta> {
    let path = package_dir.join(META_FILE_NAME);
    let raw = match tokio::fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable snapshot metadata");
            return None;
        }
    };

    match parse(&raw) {
        Ok(meta) => Some(meta),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt snapshot metadata");
            None
        }
    }
}

/// Write the metadata record into a snapshot directory.
pub async fn write(package_dir: &Path, meta: &ArtifactMeta) -> Result<(), Error> {
    let path = package_dir.join(META_FILE_NAME);
    let encoded = serialize(meta)?;
    tokio::fs::write(&path, encoded).await.map_err(|e| Error::io(&path, e))
}
