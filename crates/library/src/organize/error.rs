//! Error types for the [`organize`](super) module.

use derive_more::{Display, Error};
use std::path::PathBuf;

/// An organize error with automatic location tracking via [`exn::Exn`].
pub type Error = exn::Exn<ErrorKind>;
/// Result type alias for organize operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Classifies the origin of an organize failure.
///
/// ### Per-row Errors
/// - [`ErrorKind::Hash`]
/// - [`ErrorKind::Link`]
/// - [`ErrorKind::Occupied`]
///
/// ### Dependency Errors
/// - [`ErrorKind::Index`]
#[derive(Debug, Display, Error)]
pub enum ErrorKind {
    /// Reading or updating rows via [`hoard_index::Repository`] failed.
    #[display("index query failed")]
    Index,
    /// The content hash is too short to derive the bucket directories from.
    #[display("content hash {_0:?} cannot be bucketed")]
    Hash(#[error(not(source))] String),
    /// Creating the bucket directory or the symlink failed.
    #[display("could not link {}", _0.display())]
    Link(#[error(not(source))] PathBuf),
    /// Something other than the expected symlink already sits at the link path.
    #[display("{} is occupied", _0.display())]
    Occupied(#[error(not(source))] PathBuf),
}

impl ErrorKind {
    /// Returns `true` if retrying might succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Index | Self::Link(_))
    }
}
