//! Classification records.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::path::{Path, PathBuf};

pub const FILENAME: &str = "filename";
pub const FILEEXT: &str = "fileext";
pub const FILEEXT_MIME_TYPE: &str = "fileext-mime-type";
pub const FILEEXT_MIME_SUBTYPE: &str = "fileext-mime-subtype";
pub const FILETYPE_MIME_TYPE: &str = "filetype-mime-type";
pub const FILETYPE_MIME_SUBTYPE: &str = "filetype-mime-subtype";
pub const FILETYPE_MIME_ENCODING: &str = "filetype-mime-encoding";
pub const FILETYPE_DESCRIPTION: &str = "filetype-description";
pub const SIZE: &str = "size";

/// A typed attribute value.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Value {
    String(String),
    Int(i64),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            Self::Int(_) => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::String(_) => None,
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Self::String(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
        }
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

/// Open-ended attribute record of one classified blob.
///
/// Keyed by the blob's content hash; `path` is where the classifier looked.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BlobMeta {
    id: String,
    path: PathBuf,
    attributes: BTreeMap<String, Value>,
}

impl BlobMeta {
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self { id: id.into(), path: path.into(), attributes: BTreeMap::new() }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Set an attribute, replacing any previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }

    /// Shorthand for string attributes.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// The detected `type/subtype`, if the classifier produced one.
    pub fn mime_type(&self) -> Option<String> {
        let kind = self.get_str(FILETYPE_MIME_TYPE)?;
        let subtype = self.get_str(FILETYPE_MIME_SUBTYPE)?;
        Some(format!("{kind}/{subtype}"))
    }

    pub fn size(&self) -> Option<u64> {
        self.get(SIZE).and_then(Value::as_int).and_then(|s| u64::try_from(s).ok())
    }
}

/// Lower-cased extension of `name` without the dot; empty when there is none.
pub fn file_ext(name: &str) -> String {
    Path::new(name).extension().map(|e| e.to_string_lossy().to_lowercase()).unwrap_or_default()
}

/// MIME type and subtype guessed from the extension of `name`.
pub fn guess_mime(name: &str) -> (String, String) {
    let guess = mime_guess::from_path(name).first_or_octet_stream();
    (guess.type_().to_string(), guess.subtype().to_string())
}
