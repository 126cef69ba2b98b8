//! Fetch Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;

/// A fetch error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for fetch operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The URL scheme is none of `http`, `https`, `ssh`, `file`, or empty.
    #[display("unsupported URL scheme: {_0}")]
    UnsupportedScheme(#[error(not(source))] String),
    /// HTTP transport or status failure. Never retried here; the caller
    /// decides whether another attempt is worthwhile.
    #[display("network error: {_0}")]
    Network(#[error(not(source))] String),
    /// A required external executable is missing from `PATH`.
    #[display("`{_0}` not found: cannot resolve SSH URL")]
    ToolNotFound(#[error(not(source))] &'static str),
    /// The remote-copy command failed after the quoting fallback. Carries
    /// the last captured error output.
    #[display("download failed: {_0}")]
    Download(#[error(not(source))] String),
    /// The URL parsed but has no usable host or final path segment.
    #[display("unusable URL: {_0}")]
    InvalidUrl(#[error(not(source))] String),
    /// Underlying I/O error
    #[display("I/O error: {_0}")]
    Io(IoError),
}

impl From<IoError> for ErrorKind {
    fn from(err: IoError) -> Self {
        Self::Io(err)
    }
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Download(_) | Self::Io(_))
    }
}
