//! Request and source-resolution error types.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Fixed classification of network failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestErrorKind {
    Auth,
    RateLimit,
    NotFound,
    Network,
    Parse,
    Server,
    Unknown,
}

impl RequestErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestErrorKind::Auth => "auth",
            RequestErrorKind::RateLimit => "rate_limit",
            RequestErrorKind::NotFound => "not_found",
            RequestErrorKind::Network => "network",
            RequestErrorKind::Parse => "parse",
            RequestErrorKind::Server => "server",
            RequestErrorKind::Unknown => "unknown",
        }
    }

    /// Upper-case code used as the error display prefix.
    pub fn code(self) -> &'static str {
        match self {
            RequestErrorKind::Auth => "HTTP_AUTH",
            RequestErrorKind::RateLimit => "HTTP_RATE_LIMIT",
            RequestErrorKind::NotFound => "HTTP_NOT_FOUND",
            RequestErrorKind::Network => "HTTP_NETWORK",
            RequestErrorKind::Parse => "HTTP_PARSE",
            RequestErrorKind::Server => "HTTP_SERVER",
            RequestErrorKind::Unknown => "HTTP_UNKNOWN",
        }
    }
}

impl fmt::Display for RequestErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Map an HTTP status to its error kind.
pub fn classify_status(status: u16) -> RequestErrorKind {
    match status {
        401 | 403 => RequestErrorKind::Auth,
        404 => RequestErrorKind::NotFound,
        429 => RequestErrorKind::RateLimit,
        s if s >= 500 => RequestErrorKind::Server,
        _ => RequestErrorKind::Unknown,
    }
}

/// Errors surfaced by the retrying HTTP client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RequestError {
    /// Non-2xx response, undecodable body or invalid URL.
    #[error("{}: {message}", .kind.code())]
    Classified { kind: RequestErrorKind, message: String, status: Option<u16> },

    /// Transport-level failure from the HTTP stack.
    #[error("HTTP_NETWORK: {0}")]
    Transport(Arc<reqwest::Error>),

    /// An attempt exceeded its wall-clock budget.
    #[error("HTTP_NETWORK: request timed out after {0:?}")]
    Timeout(Duration),

    /// The caller's cancellation signal was observed.
    #[error("CANCELLED: request cancelled")]
    Cancelled,
}

impl RequestError {
    /// Error for a completed response with a failing status.
    pub fn status(status: u16, url: &str) -> Self {
        RequestError::Classified {
            kind: classify_status(status),
            message: format!("HTTP {status} for {url}"),
            status: Some(status),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        RequestError::Classified { kind: RequestErrorKind::Network, message: message.into(), status: None }
    }

    /// Classification, or `None` for cancellation.
    pub fn kind(&self) -> Option<RequestErrorKind> {
        match self {
            RequestError::Classified { kind, .. } => Some(*kind),
            RequestError::Transport(_) | RequestError::Timeout(_) => Some(RequestErrorKind::Network),
            RequestError::Cancelled => None,
        }
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            RequestError::Classified { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<reqwest::Error> for RequestError {
    fn from(err: reqwest::Error) -> Self {
        RequestError::Transport(Arc::new(err))
    }
}

/// Hard failure resolving one dependency's documentation source.
#[derive(Debug, Clone, thiserror::Error)]
pub enum SourceError {
    /// The registry identity lookup itself failed.
    #[error("SOURCE_REQUEST: {package}: {source}")]
    Request {
        package: String,
        #[source]
        source: RequestError,
    },

    /// The registry answered but named no usable version.
    #[error("SOURCE_NO_VERSION: no latest version returned for {0}")]
    NoVersion(String),

    /// The sync mode is reserved and has no resolution behavior.
    #[error("SOURCE_UNSUPPORTED_MODE: sync mode {0} is not supported")]
    UnsupportedSyncMode(fdocs_core::SyncMode),

    /// The resolution task died before producing a result.
    #[error("SOURCE_TASK: resolution task failed: {0}")]
    TaskFailed(String),

    #[error("CANCELLED: resolution cancelled")]
    Cancelled,
}

impl SourceError {
    /// Wrap a registry request failure, keeping cancellation distinct.
    pub fn request(package: &str, source: RequestError) -> Self {
        match source {
            RequestError::Cancelled => SourceError::Cancelled,
            source => SourceError::Request { package: package.to_string(), source },
        }
    }
}
