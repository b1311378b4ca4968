use crate::error::{Error, ErrorKind, Result};
use exn::ResultExt;
use sha1::{Digest, Sha1};
use std::path::{Path, PathBuf};
use time::OffsetDateTime;

/// A scanned file about to be written to the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewEntry {
    /// Hex digest of the content.
    pub content_hash: String,
    pub path: PathBuf,
    pub size: u64,
    /// `type/subtype`.
    pub mime_type: String,
    pub mod_time: Option<OffsetDateTime>,
}

impl NewEntry {
    pub fn new(content_hash: impl Into<String>, path: impl Into<PathBuf>, size: u64, mime_type: impl Into<String>) -> Self {
        Self {
            content_hash: content_hash.into(),
            path: path.into(),
            size,
            mime_type: mime_type.into(),
            mod_time: None,
        }
    }

    #[must_use]
    pub fn with_mod_time(mut self, mod_time: OffsetDateTime) -> Self {
        self.mod_time = Some(mod_time);
        self
    }
}

/// Column values of a [`NewEntry`], in insert order.
pub(crate) struct EntryRow {
    pub content_hash: String,
    pub path_hash: String,
    pub path: String,
    pub size: i64,
    pub mime_type: String,
    pub mod_time: Option<i64>,
}

impl TryFrom<&NewEntry> for EntryRow {
    type Error = Error;
    fn try_from(entry: &NewEntry) -> std::result::Result<Self, Self::Error> {
        let path = sqlx_hates_paths(&entry.path)?;
        Ok(Self {
            content_hash: entry.content_hash.clone(),
            path_hash: path_hash(&path),
            size: i64::try_from(entry.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            mime_type: entry.mime_type.clone(),
            mod_time: entry.mod_time.map(OffsetDateTime::unix_timestamp),
            path,
        })
    }
}

/// A row of the index.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub id: i64,
    pub content_hash: String,
    pub path: PathBuf,
    pub size: u64,
    pub mime_type: String,
    pub mod_time: Option<OffsetDateTime>,
    pub linked: bool,
}

#[derive(sqlx::FromRow)]
pub(crate) struct StoredRow {
    id: i64,
    content_hash: String,
    path: String,
    size: i64,
    mime_type: String,
    mod_time: Option<i64>,
    status: i64,
}

impl TryFrom<StoredRow> for Entry {
    type Error = Error;
    fn try_from(row: StoredRow) -> std::result::Result<Self, Self::Error> {
        Ok(Self {
            id: row.id,
            content_hash: row.content_hash,
            path: PathBuf::from(row.path),
            size: u64::try_from(row.size).or_raise(|| ErrorKind::InvalidData("size"))?,
            mime_type: row.mime_type,
            mod_time: row
                .mod_time
                .map(|t| OffsetDateTime::from_unix_timestamp(t).or_raise(|| ErrorKind::InvalidData("mod time")))
                .transpose()?,
            linked: row.status != 0,
        })
    }
}

pub(crate) fn sqlx_hates_paths(path: &Path) -> Result<String> {
    match path.to_str() {
        Some(path) => Ok(path.to_string()),
        None => exn::bail!(ErrorKind::InvalidData("path")),
    }
}

/// Hex SHA-1 of the path string.
pub fn path_hash(path: &str) -> String {
    hex::encode(Sha1::digest(path.as_bytes()))
}
