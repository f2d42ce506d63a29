//! Time-boxed reuse of newest-version lookups.
//!
//! Keyed by package name. Entries are replaced whole, so concurrent
//! refreshes of one key end last-writer-wins and a reader never sees a torn
//! entry. A read before expiry may return a version that upstream has since
//! superseded; staleness is bounded by the TTL.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::RwLock;

use fdocs_core::Clock;

#[derive(Debug, Clone)]
struct CachedVersion {
    version: String,
    expires_at: DateTime<Utc>,
}

/// In-memory newest-version cache with an injectable clock.
#[derive(Clone)]
pub struct LatestVersionCache {
    entries: Arc<RwLock<HashMap<String, CachedVersion>>>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl std::fmt::Debug for LatestVersionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LatestVersionCache").field("ttl", &self.ttl).finish_non_exhaustive()
    }
}

impl LatestVersionCache {
    pub fn new(clock: Arc<dyn Clock>, ttl: Duration) -> Self {
        Self { entries: Arc::new(RwLock::new(HashMap::new())), clock, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached version for `name` if it has not expired.
    pub async fn get(&self, name: &str) -> Option<String> {
        let now = self.clock.now();
        let entries = self.entries.read().await;
        let cached = entries.get(name).filter(|c| c.expires_at > now)?;
        tracing::debug!("latest version cache hit for {}: {}", name, cached.version);
        Some(cached.version.clone())
    }

    /// Cache `version` for `name`. A TTL reaching past the representable
    /// range pins the entry at the latest instant instead.
    pub async fn insert(&self, name: &str, version: &str) {
        let expires_at = self.clock.now().checked_add_signed(self.ttl).unwrap_or(DateTime::<Utc>::MAX_UTC);
        let entry = CachedVersion { version: version.to_string(), expires_at };
        self.entries.write().await.insert(name.to_string(), entry);
    }

    /// Drop expired entries.
    pub async fn cleanup_expired(&self) {
        let now = self.clock.now();
        self.entries.write().await.retain(|_, cached| cached.expires_at > now);
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }
}
