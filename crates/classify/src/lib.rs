//! Content-type classification of blobs.
//!
//! Blobs are grouped into batches; each batch is classified with two calls to
//! a [`Detector`] (the `file` command in production) and the line-oriented
//! answers are matched back to the blob they describe.

mod batch;
mod detector;
pub mod error;
pub mod meta;
mod parse;

pub use crate::batch::{Classified, Classifier, DEFAULT_BATCH_SIZE, DEFAULT_MAX_IN_FLIGHT};
pub use crate::detector::{Detector, FileCommand};
pub use crate::meta::{BlobMeta, Value};
pub use crate::parse::MimeType;
