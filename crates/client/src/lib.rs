//! Network side of ai-fdocs.
//!
//! This crate provides the retrying HTTP client, the per-ecosystem source
//! resolution adapters with their repository fallback, the newest-version
//! reuse cache, and bounded-parallel batch resolution.

pub mod batch;
pub mod cancel;
pub mod error;
pub mod net;
pub mod sources;

pub use batch::{ResolveOutcome, ResolveRequest, resolve_all};
pub use cancel::CancelToken;
pub use error::{RequestError, RequestErrorKind, SourceError, classify_status};
pub use net::{HttpMethod, HttpResponse, HttpTransport, ReqwestTransport, RetryClient, RetryOptions};
pub use sources::{
    LatestVersionCache, ResolveOptions, ResolvedSource, SourceAdapter, SourceAttempt, SourceResolver,
};
