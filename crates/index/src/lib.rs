//! SQLite index of scanned files.
//!
//! A scan writes one row per file path (content hash, path hash, size, MIME
//! type and modification time) through an [`IndexWriter`]. The organizer reads
//! the rows that are still pending through the [`Repository`] and marks them
//! linked once it has created their symlinks.

mod db;
mod entry;
pub mod error;
mod repo;
mod writer;

pub use crate::db::Database;
pub use crate::entry::{Entry, NewEntry, path_hash};
pub use crate::repo::Repository;
pub use crate::writer::{DEFAULT_BATCH_SIZE, IndexWriter};
