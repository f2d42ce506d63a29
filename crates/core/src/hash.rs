//! Content and configuration hashing.
//!
//! The store treats fingerprints and config hashes as opaque strings.
//! These helpers give producers a stable way to compute them.

use std::collections::BTreeMap;

use serde::Serialize;
use sha2::{Digest, Sha256};

use crate::Error;

/// Hash the canonical JSON form of a per-dependency configuration value.
///
/// Object keys are emitted in sorted order by `serde_json::Value`, so two
/// configs that differ only in field order hash identically.
pub fn compute_config_hash<T: Serialize>(config: &T) -> Result<String, Error> {
    let value = serde_json::to_value(config).map_err(|e| Error::InvalidInput(e.to_string()))?;
    let canonical = value.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Compute a content fingerprint over a set of `(relative path, content)` pairs.
pub fn compute_fingerprint(files: &BTreeMap<String, String>) -> String {
    let mut hasher = Sha256::new();
    for (path, content) in files {
        hasher.update(path.as_bytes());
        hasher.update(b"\n");
        hasher.update((content.len() as u64).to_le_bytes());
        hasher.update(content.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
