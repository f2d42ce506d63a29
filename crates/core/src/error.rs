//! Unified error types for the docs cache.
//!
//! Every variant carries an upper-case code prefix so that callers
//! surfacing errors to a user or a log can match on a stable token.

use std::path::PathBuf;

/// Unified error type for the docs cache core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Invalid input parameters (e.g., a file path escaping the snapshot).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// Filesystem operation on the cache failed.
    #[error("STORE_IO: {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Metadata could not be encoded.
    #[error("META_ENCODE: {0}")]
    MetaEncode(#[from] toml::ser::Error),

    /// Metadata could not be decoded.
    #[error("META_PARSE: {0}")]
    MetaParse(#[from] toml::de::Error),

    /// A status/check report matched none of the recognized shapes.
    #[error("REPORT_SHAPE: {0}")]
    ReportShape(String),

    /// No snapshot or summary stored for the given package.
    #[error("NOT_FOUND: {0}")]
    NotFound(String),
}

impl Error {
    /// Wrap an I/O error with the path it happened on.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io { path: path.into(), source }
    }

    /// Short machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "INVALID_INPUT",
            Error::Io { .. } => "STORE_IO",
            Error::MetaEncode(_) => "META_ENCODE",
            Error::MetaParse(_) => "META_PARSE",
            Error::ReportShape(_) => "REPORT_SHAPE",
            Error::NotFound(_) => "NOT_FOUND",
        }
    }
}
