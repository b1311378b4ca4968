//! Symlink farm of indexed files.
//!
//! Every pending index row gets a symlink pointing at its original path:
//!
//! ```text
//! <target>/<Pictures|Videos|Documents>/<hash[0:2]>/<hash[2:4]>/<hash><ext>
//! ```
//!
//! The primary entry point is [`organize`], which streams one
//! [`OrganizeEvent`] per row and marks linked rows in the index as it goes.

pub mod error;
mod file;
mod stream;

pub use self::file::{Action, Category, Context, extension, link_entry, link_path};
pub use self::stream::{MARK_BATCH, OrganizeEvent, organize};
