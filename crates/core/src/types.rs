//! Shared domain enumerations and identities.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Package ecosystem a dependency belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Ecosystem {
    Rust,
    Npm,
}

impl Ecosystem {
    /// Sub-directory of the output root holding this ecosystem's snapshots.
    pub fn as_dir(self) -> &'static str {
        match self {
            Ecosystem::Rust => "rust",
            Ecosystem::Npm => "npm",
        }
    }
}

impl fmt::Display for Ecosystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_dir())
    }
}

/// A dependency's identity: its name within an ecosystem.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DependencyIdentity {
    pub name: String,
    pub ecosystem: Ecosystem,
}

impl DependencyIdentity {
    pub fn new(name: impl Into<String>, ecosystem: Ecosystem) -> Self {
        Self { name: name.into(), ecosystem }
    }

    pub fn rust(name: impl Into<String>) -> Self {
        Self::new(name, Ecosystem::Rust)
    }

    pub fn npm(name: impl Into<String>) -> Self {
        Self::new(name, Ecosystem::Npm)
    }
}

/// Kind of documentation location a source resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    DocsSite,
    RegistryTarball,
    Repository,
    RepositoryFallback,
    Mixed,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::DocsSite => "docs-site",
            SourceKind::RegistryTarball => "registry-tarball",
            SourceKind::Repository => "repository",
            SourceKind::RepositoryFallback => "repository-fallback",
            SourceKind::Mixed => "mixed",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Policy deciding which version of a dependency to document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SyncMode {
    /// Exactly the locked version.
    #[default]
    #[serde(rename = "lockfile")]
    Lockfile,
    /// Newest upstream version, with time-boxed reuse.
    #[serde(rename = "latest-docs", alias = "latest_docs")]
    LatestDocs,
    /// Reserved; no resolution behavior is defined for it.
    #[serde(rename = "hybrid")]
    Hybrid,
}

impl SyncMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SyncMode::Lockfile => "lockfile",
            SyncMode::LatestDocs => "latest-docs",
            SyncMode::Hybrid => "hybrid",
        }
    }

    /// Parse a mode name, returning `fallback` for absent or unknown values.
    pub fn parse_or(value: Option<&str>, fallback: SyncMode) -> SyncMode {
        value.and_then(|v| v.parse().ok()).unwrap_or(fallback)
    }
}

impl FromStr for SyncMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "lockfile" => Ok(SyncMode::Lockfile),
            "latest-docs" | "latest_docs" => Ok(SyncMode::LatestDocs),
            "hybrid" => Ok(SyncMode::Hybrid),
            other => Err(format!("unknown sync mode: {other}")),
        }
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Preferred documentation source for registry-tarball ecosystems.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocsSource {
    #[default]
    NpmTarball,
    Github,
}

impl DocsSource {
    pub fn as_str(self) -> &'static str {
        match self {
            DocsSource::NpmTarball => "npm_tarball",
            DocsSource::Github => "github",
        }
    }
}

impl FromStr for DocsSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "npm_tarball" => Ok(DocsSource::NpmTarball),
            "github" => Ok(DocsSource::Github),
            other => Err(format!("unsupported docs source: {other} (use github or npm_tarball)")),
        }
    }
}
