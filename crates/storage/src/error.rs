//! Storage Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Only construction errors ever reach a caller. Everything that goes wrong
//! while a run is in flight is counted on its
//! [`ProcessStatus`](hoard_blob::ProcessStatus) and logged.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A storage error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for storage operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// A worker pool size is outside of [`MIN_WORKERS`](crate::MIN_WORKERS)..=
    /// [`MAX_WORKERS`](crate::MAX_WORKERS).
    #[display("{what} {value} is out of allowed range [1, 20]")]
    PoolSize { what: &'static str, value: usize },
    /// The root directory could not be resolved to an absolute path.
    #[display("invalid root: {}", _0.display())]
    InvalidRoot(#[error(not(source))] PathBuf),
    /// A blob reached the store without a fingerprint.
    #[display("blob has not been loaded: {_0}")]
    NotLoaded(#[error(not(source))] String),
    /// A directory or file inside the store could not be created or written.
    #[display("failed to write: {}", _0.display())]
    Write(#[error(not(source))] PathBuf),
    /// The `meta` record of a stored blob is unreadable or unwritable.
    #[display("invalid blob record: {}", _0.display())]
    Record(#[error(not(source))] PathBuf),
    /// A blob operation (load, relocation) failed.
    #[display("blob error")]
    Blob,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Write(_))
    }
}
