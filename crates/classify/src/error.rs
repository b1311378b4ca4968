//! Classify Error Types
//!
//! This module provides structured errors using `exn` for automatic location
//! tracking and error tree construction.
//!
//! Batch-level and line-level failures never abort a run: they travel down the
//! result stream as values alongside the successful items.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// A classification error with automatic location tracking.
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for classification operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Actionable error categories.
///
/// These describe what the caller should *do*, not what went wrong internally.
#[derive(Clone, Debug, Display, Error)]
pub enum ErrorKind {
    /// The `file` executable is not installed (or not on `PATH`).
    #[display("`file` command not found on your system")]
    CommandNotFound,
    /// Batch size and in-flight limit must both be at least one.
    #[display("{_0} must be at least 1")]
    InvalidLimit(#[error(not(source))] &'static str),
    /// The classifier could not be started or exited unsuccessfully.
    #[display("classifier invocation failed: {_0}")]
    Invocation(#[error(not(source))] String),
    /// The temporary path listing could not be written.
    #[display("failed to write path listing")]
    Listing,
    /// A response line did not start with any path of its batch.
    #[display("failed to match path for line: {_0}")]
    UnmatchedLine(#[error(not(source))] String),
    /// A MIME response line did not read `type/subtype; charset=encoding`.
    #[display("failed to parse mime info for line: {_0}")]
    MalformedMime(#[error(not(source))] String),
    /// The classifier said nothing about a path it was given.
    #[display("no classification result for {}", _0.display())]
    MissingResult(#[error(not(source))] PathBuf),
    /// The blob can't be classified (unloaded or not addressable by path).
    #[display("blob can not be classified: {_0}")]
    Unclassifiable(#[error(not(source))] String),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Invocation(_) | Self::Listing)
    }

    /// `true` for errors that describe a single response line rather than an
    /// item of the batch.
    pub fn is_stray_line(&self) -> bool {
        matches!(self, Self::UnmatchedLine(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::InvalidLimit("batch_size").to_string(), "batch_size must be at least 1");
        assert_eq!(
            ErrorKind::MalformedMime("/a: text/plain".to_string()).to_string(),
            "failed to parse mime info for line: /a: text/plain"
        );
    }
}
