//! Filesystem walking, loading and content-addressed storage of blobs.
//!
//! [`FileSystem::load`] walks a directory tree with a pool of loaders and
//! emits one fingerprinted [`Blob`](hoard_blob::Blob) per file.
//! [`FileSystem::store`] consumes blobs with a pool of savers and writes each
//! distinct content exactly once under its sharded address.

pub mod error;
mod fs;
mod load;
mod path;
mod record;
mod skip;
mod store;
mod walk;

pub use crate::fs::{DEFAULT_WORKERS, FileSystem};
pub use crate::path::{SHARD_LEVELS, shard as shard_path};
pub use crate::record::StoredRecord;
pub use crate::skip::{Skip, is_hidden};
pub use crate::walk::walk;

/// Smallest allowed worker pool.
pub const MIN_WORKERS: usize = 1;
/// Largest allowed worker pool.
pub const MAX_WORKERS: usize = 20;
