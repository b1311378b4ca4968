//! Pipelines composed from the hoard crates.
//!
//! - [`index`](mod@index): walk and load a directory tree, classify every
//!   file with `file`, and record one row per path in the index.
//! - [`organize`](mod@organize): turn pending index rows into a symlink farm
//!   bucketed by MIME category and content hash.

pub mod error;
pub mod index;
pub mod organize;

pub use crate::index::{IndexReport, index};
pub use crate::organize::{Action, Context, OrganizeEvent, organize};
