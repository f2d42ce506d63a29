//! Bounded-parallel resolution of many dependencies.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::{self, JoinSet};

use fdocs_core::DependencyIdentity;

use crate::error::SourceError;
use crate::sources::{ResolveOptions, ResolvedSource, SourceResolver};

/// One dependency to resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolveRequest {
    pub identity: DependencyIdentity,
    pub lock_version: String,
}

impl ResolveRequest {
    pub fn new(identity: DependencyIdentity, lock_version: impl Into<String>) -> Self {
        Self { identity, lock_version: lock_version.into() }
    }
}

/// Result for one request. A failure here never affects other requests.
#[derive(Debug)]
pub struct ResolveOutcome {
    pub request: ResolveRequest,
    pub result: Result<ResolvedSource, SourceError>,
}

/// Resolve every request with at most `concurrency` in flight.
///
/// Outcomes come back in completion order, one per request. Once
/// `options.cancel` fires no new resolution starts and every remaining or
/// in-flight request yields [`SourceError::Cancelled`]. A task that panics
/// yields [`SourceError::TaskFailed`] for its own request only.
pub async fn resolve_all(
    resolver: Arc<SourceResolver>, requests: Vec<ResolveRequest>, concurrency: usize, options: ResolveOptions,
) -> Vec<ResolveOutcome> {
    let semaphore = Arc::new(Semaphore::new(concurrency.max(1)));
    let mut join_set = JoinSet::new();
    let mut pending: HashMap<task::Id, ResolveRequest> = HashMap::new();
    let mut outcomes = Vec::with_capacity(requests.len());

    for request in requests {
        let permit = match semaphore.clone().acquire_owned().await {
            Ok(permit) if !options.cancel.is_cancelled() => permit,
            _ => {
                outcomes.push(ResolveOutcome { request, result: Err(SourceError::Cancelled) });
                continue;
            }
        };

        let resolver = resolver.clone();
        let options = options.clone();
        let tracked = request.clone();
        let handle = join_set.spawn(async move {
            let _permit = permit;
            let result = resolver
                .resolve(&request.identity, &request.lock_version, &options)
                .await;
            let result = if options.cancel.is_cancelled() { Err(SourceError::Cancelled) } else { result };
            ResolveOutcome { request, result }
        });
        pending.insert(handle.id(), tracked);
    }

    while let Some(joined) = join_set.join_next_with_id().await {
        match joined {
            Ok((id, outcome)) => {
                pending.remove(&id);
                outcomes.push(outcome);
            }
            Err(e) => {
                tracing::warn!("resolution task failed: {}", e);
                if let Some(request) = pending.remove(&e.id()) {
                    outcomes.push(ResolveOutcome { request, result: Err(SourceError::TaskFailed(e.to_string())) });
                }
            }
        }
    }

    let failed = outcomes.iter().filter(|o| o.result.is_err()).count();
    tracing::info!("resolved {} dependencies ({} failed)", outcomes.len(), failed);
    outcomes
}
