//! Core value types shared by every hoard pipeline.
//!
//! - [`Fingerprint`]: the algorithm-tagged content hash used as identity and
//!   dedup key.
//! - [`Blob`]: a unit of content, either a [`SourceBlob`] waiting to be (or
//!   already) loaded, or a [`StoredBlob`] living in a content-addressed store.
//! - [`ProcessStatus`]: live counters, output queue and completion signal for
//!   one asynchronous load or store run.

mod blob;
pub mod error;
mod fingerprint;
mod status;

pub use crate::blob::{BLOB_FILE, Blob, META_FILE, SourceBlob, StoredBlob};
pub use crate::fingerprint::{ALGORITHM, Fingerprint};
pub use crate::status::{ProcessKind, ProcessStatus, StatusSnapshot};
use std::sync::Arc;

/// Statuses are shared between the caller and the workers of a run.
pub type StatusHandle = Arc<ProcessStatus>;
