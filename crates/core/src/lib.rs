//! Core types and shared functionality for ai-fdocs.
//!
//! This crate provides:
//! - The on-disk artifact store with its freshness and prune policy
//! - The snapshot metadata codec and the root manifest builder
//! - Normalization of status/check reports into one canonical shape
//! - Configuration, error types and an injectable clock

pub mod clock;
pub mod config;
pub mod error;
pub mod hash;
pub mod report;
pub mod store;
pub mod types;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use report::{CanonicalReport, DependencyState, DependencyStatus, StatusSummary};
pub use store::{
    ActiveDependency, ArtifactMeta, ArtifactStore, DependencyArtifact, PruneOptions, RefreshReason, UpdateOptions,
    UpdateOutcome,
};
pub use types::{DependencyIdentity, DocsSource, Ecosystem, SourceKind, SyncMode};
