//! Blob Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A blob error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for blob operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// The source file could not be opened or read.
    #[display("failed to read blob source: {}", _0.display())]
    Read(#[error(not(source))] PathBuf),
    /// The blob content was requested before the blob was loaded.
    #[display("blob has not been loaded: {}", _0.display())]
    NotLoaded(#[error(not(source))] PathBuf),
    /// Paths must be absolute to be turned into a location reference.
    #[display("path is not absolute: {}", _0.display())]
    RelativePath(#[error(not(source))] PathBuf),
    /// A fingerprint string could not be parsed.
    #[display("invalid fingerprint: {_0}")]
    InvalidFingerprint(#[error(not(source))] String),
    /// The status snapshot could not be serialized.
    #[display("status serialization failed")]
    Serialize,
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Read(_))
    }
}
