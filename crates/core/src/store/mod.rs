//! On-disk cache of documentation snapshots.
//!
//! Layout under the store root:
//!
//! ```text
//! <root>/_INDEX.md
//! <root>/<name>@<version>/_SUMMARY.md
//! <root>/<name>@<version>/.aifd-meta.toml
//! <root>/<name>@<version>/<relative files...>
//! ```
//!
//! There is at most one directory per `(name, version)`. A refresh removes
//! the old directory before writing the new one; contents are never merged.
//! The manifest is rebuilt from a fresh directory scan after every mutation.

pub mod index;
pub mod meta;

use std::collections::{BTreeMap, HashMap};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::Error;
use crate::clock::{Clock, SystemClock};

pub use index::{INDEX_FILE_NAME, IndexEntry};
pub use meta::{ArtifactMeta, META_FILE_NAME, SCHEMA_VERSION};

/// File name of the per-snapshot summary.
pub const SUMMARY_FILE_NAME: &str = "_SUMMARY.md";

const TRUNCATION_MARKER: &str = "\n\n<!-- truncated by ai-fdocs -->\n";

/// Fetched documentation for one dependency, ready to be stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DependencyArtifact {
    pub name: String,
    pub version: String,
    pub fingerprint: String,
    pub config_hash: String,
    pub summary: String,
    /// Relative path -> content.
    #[serde(default)]
    pub files: BTreeMap<String, String>,
    #[serde(default)]
    pub source_ref: Option<String>,
    #[serde(default)]
    pub is_fallback: Option<bool>,
}

impl DependencyArtifact {
    /// Identity used by the freshness decision.
    pub fn key(&self) -> SnapshotKey {
        SnapshotKey {
            name: self.name.clone(),
            version: self.version.clone(),
            fingerprint: self.fingerprint.clone(),
            config_hash: self.config_hash.clone(),
        }
    }
}

/// The expected identity of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SnapshotKey {
    pub name: String,
    pub version: String,
    pub fingerprint: String,
    pub config_hash: String,
}

/// Options for [`ArtifactStore::update`] and [`ArtifactStore::needs_refresh`].
#[derive(Debug, Clone, Default)]
pub struct UpdateOptions {
    pub force: bool,
    /// Snapshots older than this are refreshed. Ignored unless positive.
    pub ttl: Option<Duration>,
}

/// Why a snapshot was (or must be) refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefreshReason {
    Force,
    Missing,
    VersionDrift,
    FingerprintDrift,
    ConfigDrift,
    TtlExpired,
}

impl RefreshReason {
    pub fn as_str(self) -> &'static str {
        match self {
            RefreshReason::Force => "force",
            RefreshReason::Missing => "missing",
            RefreshReason::VersionDrift => "version-drift",
            RefreshReason::FingerprintDrift => "fingerprint-drift",
            RefreshReason::ConfigDrift => "config-drift",
            RefreshReason::TtlExpired => "ttl-expired",
        }
    }
}

/// Result of [`ArtifactStore::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateOutcome {
    pub refreshed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RefreshReason>,
}

/// What the caller currently expects for one active dependency.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveDependency {
    pub version: String,
    pub fingerprint: String,
    pub config_hash: String,
}

/// Options for [`ArtifactStore::delete`].
#[derive(Debug, Clone, Default)]
pub struct PruneOptions {
    /// Active dependencies keyed by name.
    pub active: HashMap<String, ActiveDependency>,
    /// Remove every snapshot regardless of the active set.
    pub force_clean: bool,
}

/// Write-time limits applied by the store.
#[derive(Debug, Clone, Default)]
pub struct StoreOptions {
    /// Per-file cap in KiB; larger content is truncated with a marker.
    pub max_file_size_kb: Option<usize>,
}

/// A snapshot directory discovered by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotDir {
    pub name: String,
    pub version: String,
    pub dir_name: String,
    pub path: PathBuf,
}

/// Directory name of a snapshot. `/` in names is encoded as `%2F`.
pub fn package_dir_name(name: &str, version: &str) -> String {
    format!("{}@{}", name.replace('/', "%2F"), version)
}

/// Split a directory name into `(name, version)` on the last `@`.
pub fn parse_package_dir_name(dir_name: &str) -> Option<(String, String)> {
    let at = dir_name.rfind('@')?;
    if at == 0 || at + 1 == dir_name.len() {
        return None;
    }
    Some((dir_name[..at].replace("%2F", "/"), dir_name[at + 1..].to_string()))
}

/// On-disk artifact store rooted at one directory.
#[derive(Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
    options: StoreOptions,
}

impl std::fmt::Debug for ArtifactStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArtifactStore")
            .field("root", &self.root)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl ArtifactStore {
    /// Create a store rooted at `root` using the system clock.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), clock: Arc::new(SystemClock), options: StoreOptions::default() }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_options(mut self, options: StoreOptions) -> Self {
        self.options = options;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the snapshot directory for `(name, version)`.
    pub fn package_dir(&self, name: &str, version: &str) -> PathBuf {
        self.root.join(package_dir_name(name, version))
    }

    /// Unconditionally (re)write the snapshot for `artifact`, then rebuild
    /// the manifest.
    ///
    /// Any existing directory for the same `(name, version)` is removed
    /// first. If the write is interrupted the snapshot reads as missing.
    pub async fn pull(&self, artifact: DependencyArtifact) -> Result<(), Error> {
        validate_artifact(&artifact)?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Error::io(&self.root, e))?;

        let pkg_dir = self.package_dir(&artifact.name, &artifact.version);
        remove_dir_if_exists(&pkg_dir).await?;
        tokio::fs::create_dir_all(&pkg_dir)
            .await
            .map_err(|e| Error::io(&pkg_dir, e))?;

        for (relative, content) in &artifact.files {
            let target = pkg_dir.join(relative);
            if let Some(parent) = target.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| Error::io(parent, e))?;
            }
            let content = self.cap_content(content);
            tokio::fs::write(&target, content.as_bytes())
                .await
                .map_err(|e| Error::io(&target, e))?;
        }

        let summary_path = pkg_dir.join(SUMMARY_FILE_NAME);
        tokio::fs::write(&summary_path, artifact.summary.as_bytes())
            .await
            .map_err(|e| Error::io(&summary_path, e))?;

        let record = ArtifactMeta {
            schema_version: SCHEMA_VERSION,
            package_name: artifact.name.clone(),
            version: artifact.version.clone(),
            fetched_at: self.clock.now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            fingerprint: artifact.fingerprint,
            config_hash: artifact.config_hash,
            is_fallback: artifact.is_fallback.unwrap_or(false),
            source_ref: artifact.source_ref,
        };
        meta::write(&pkg_dir, &record).await?;

        tracing::info!(
            package = %artifact.name,
            version = %artifact.version,
            files = artifact.files.len(),
            "snapshot written"
        );

        self.rebuild_index().await
    }

    /// Refresh the snapshot if the freshness decision says so.
    pub async fn update(&self, artifact: DependencyArtifact, options: &UpdateOptions) -> Result<UpdateOutcome, Error> {
        let reason = self.needs_refresh(&artifact.key(), options).await;

        match reason {
            Some(reason) => {
                tracing::debug!(package = %artifact.name, version = %artifact.version, reason = reason.as_str(), "refreshing snapshot");
                self.pull(artifact).await?;
                Ok(UpdateOutcome { refreshed: true, reason: Some(reason) })
            }
            None => {
                tracing::debug!(package = %artifact.name, version = %artifact.version, "snapshot is fresh");
                Ok(UpdateOutcome { refreshed: false, reason: None })
            }
        }
    }

    /// Freshness decision for `key`. `None` means the snapshot can be kept.
    ///
    /// Checks run in a fixed order and the first match wins: force, missing
    /// directory, missing summary, missing or corrupt metadata, version
    /// drift, fingerprint drift, config drift, TTL expiry.
    pub async fn needs_refresh(&self, key: &SnapshotKey, options: &UpdateOptions) -> Option<RefreshReason> {
        if options.force {
            return Some(RefreshReason::Force);
        }

        let pkg_dir = self.package_dir(&key.name, &key.version);
        if !is_dir(&pkg_dir).await {
            return Some(RefreshReason::Missing);
        }

        if !is_file(&pkg_dir.join(SUMMARY_FILE_NAME)).await {
            return Some(RefreshReason::Missing);
        }

        let Some(meta) = meta::read(&pkg_dir).await else {
            return Some(RefreshReason::Missing);
        };

        if meta.version != key.version {
            return Some(RefreshReason::VersionDrift);
        }
        if meta.fingerprint != key.fingerprint {
            return Some(RefreshReason::FingerprintDrift);
        }
        if meta.config_hash != key.config_hash {
            return Some(RefreshReason::ConfigDrift);
        }

        if let Some(ttl) = options.ttl
            && ttl > Duration::zero()
            && let Some(fetched_at) = meta.fetched_at_utc()
            && self.clock.now() - fetched_at >= ttl
        {
            return Some(RefreshReason::TtlExpired);
        }

        None
    }

    /// Sweep snapshots that no longer match the active set, then rebuild
    /// the manifest. Returns the removed directory names, sorted.
    pub async fn delete(&self, options: &PruneOptions) -> Result<Vec<String>, Error> {
        if !is_dir(&self.root).await {
            return Ok(Vec::new());
        }

        let mut removed = Vec::new();
        for snapshot in self.list_snapshots().await? {
            let active = options.active.get(&snapshot.name);
            let meta = meta::read(&snapshot.path).await;

            let remove = match (active, &meta) {
                _ if options.force_clean => true,
                (None, _) | (_, None) => true,
                (Some(active), Some(meta)) => {
                    snapshot.version != active.version
                        || meta.version != snapshot.version
                        || (!meta.package_name.is_empty() && meta.package_name != snapshot.name)
                        || meta.fingerprint != active.fingerprint
                        || meta.config_hash != active.config_hash
                }
            };

            if remove {
                remove_dir_if_exists(&snapshot.path).await?;
                tracing::info!(dir = %snapshot.dir_name, "pruned snapshot");
                removed.push(snapshot.dir_name);
            }
        }

        removed.sort();
        self.rebuild_index().await?;
        Ok(removed)
    }

    /// Rebuild the manifest from a fresh scan of the root directory.
    pub async fn rebuild_index(&self) -> Result<(), Error> {
        let mut entries = Vec::new();
        for snapshot in self.list_snapshots().await? {
            let is_fallback = meta::read(&snapshot.path)
                .await
                .map(|m| m.is_fallback)
                .unwrap_or(false);
            entries.push(IndexEntry { name: snapshot.name, version: snapshot.version, is_fallback });
        }
        index::write(&self.root, &entries).await
    }

    /// Read the stored summary, or `None` if there is none.
    pub async fn read_summary(&self, name: &str, version: &str) -> Result<Option<String>, Error> {
        let path = self.package_dir(name, version).join(SUMMARY_FILE_NAME);
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(Error::io(&path, e)),
        }
    }

    /// Read the metadata of a snapshot, treating corruption as absence.
    pub async fn read_meta(&self, name: &str, version: &str) -> Option<ArtifactMeta> {
        meta::read(&self.package_dir(name, version)).await
    }

    /// Every snapshot directory currently under the root, sorted by name.
    pub async fn list_snapshots(&self) -> Result<Vec<SnapshotDir>, Error> {
        let mut dir = match tokio::fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::io(&self.root, e)),
        };

        let mut found = Vec::new();
        while let Some(entry) = dir.next_entry().await.map_err(|e| Error::io(&self.root, e))? {
            let file_type = entry.file_type().await.map_err(|e| Error::io(entry.path(), e))?;
            if !file_type.is_dir() {
                continue;
            }
            let dir_name = entry.file_name().to_string_lossy().into_owned();
            let Some((name, version)) = parse_package_dir_name(&dir_name) else {
                continue;
            };
            found.push(SnapshotDir { name, version, dir_name, path: entry.path() });
        }

        found.sort_by(|a, b| a.dir_name.cmp(&b.dir_name));
        Ok(found)
    }

    fn cap_content<'a>(&self, content: &'a str) -> std::borrow::Cow<'a, str> {
        let Some(limit) = self.options.max_file_size_kb.map(|kb| kb * 1024) else {
            return content.into();
        };
        if content.len() <= limit {
            return content.into();
        }
        let mut cut = limit;
        while !content.is_char_boundary(cut) {
            cut -= 1;
        }
        format!("{}{}", &content[..cut], TRUNCATION_MARKER).into()
    }
}

fn validate_artifact(artifact: &DependencyArtifact) -> Result<(), Error> {
    if artifact.name.trim().is_empty() {
        return Err(Error::InvalidInput("package name must not be empty".into()));
    }
    if artifact.version.trim().is_empty() || artifact.version.contains(['/', '\\']) {
        return Err(Error::InvalidInput(format!("invalid version for {}: {:?}", artifact.name, artifact.version)));
    }
    if artifact.name.split('/').any(|part| part == ".." || part == ".") {
        return Err(Error::InvalidInput(format!("invalid package name: {}", artifact.name)));
    }

    for relative in artifact.files.keys() {
        let path = Path::new(relative);
        let safe = !relative.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
        if !safe {
            return Err(Error::InvalidInput(format!("unsafe file path in {}: {relative}", artifact.name)));
        }
        if relative == SUMMARY_FILE_NAME || relative == META_FILE_NAME {
            return Err(Error::InvalidInput(format!("reserved file name in {}: {relative}", artifact.name)));
        }
    }
    Ok(())
}

async fn remove_dir_if_exists(path: &Path) -> Result<(), Error> {
    match tokio::fs::remove_dir_all(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(Error::io(path, e)),
    }
}

async fn is_dir(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
}

async fn is_file(path: &Path) -> bool {
    tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false)
}
