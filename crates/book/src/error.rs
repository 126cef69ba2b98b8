//! Book Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::io::Error as IoError;
use std::path::PathBuf;

/// A book error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for book operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A required external executable is missing from `PATH`.
    #[display("`{_0}` not found: cannot convert this book")]
    ToolNotFound(#[error(not(source))] &'static str),
    /// The conversion tool reported failure or produced no output at the
    /// expected path.
    #[display("conversion failed: {_0}")]
    Conversion(#[error(not(source))] String),
    /// Fetching the book through the file cache failed.
    #[display("could not fetch book")]
    Fetch,
    /// File or directory does not exist
    #[display("not found: {}", _0.display())]
    NotFound(#[error(not(source))] PathBuf),
    /// The archive or its packaging metadata could not be parsed.
    #[display("malformed book: {_0}")]
    Malformed(#[error(not(source))] String),
    /// Accessor called before `initialize()` or after `cleanup()`.
    #[display("book not initialized")]
    Uninitialized,
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
    /// Convert a fetch error into a book error, preserving the fetch
    /// crate's `Exn` frame (error tree) as a child in its own error tree.
    #[track_caller]
    pub fn fetch(err: folio_fetch::error::Error) -> Error {
        err.raise(ErrorKind::Fetch)
    }

    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Fetch | Self::Io(_))
    }
}
