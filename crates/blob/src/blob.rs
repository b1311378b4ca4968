//! Blob variants.
//!
//! A blob starts life as a [`SourceBlob`]: a path discovered by a walker
//! that has not been read yet. A loader reads it exactly once, which sets the
//! content and the [`Fingerprint`] together. Once the store pipeline has
//! written it, a brand new [`StoredBlob`] describes where it ended up; the
//! source blob is never turned into the stored one.

use crate::Fingerprint;
use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::fs::File;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use url::Url;

/// File name of the raw content inside a stored blob directory.
pub const BLOB_FILE: &str = "blob";
/// File name of the JSON metadata record inside a stored blob directory.
pub const META_FILE: &str = "meta";

type BoxSyncRead<'a> = Box<dyn Read + Send + 'a>;

// Content and fingerprint live together so a blob can never be observed with
// one set and the other missing.
#[derive(Clone)]
struct Loaded {
    content: Vec<u8>,
    fingerprint: Fingerprint,
}

fn location_of(path: &Path) -> Result<Url> {
    Url::from_file_path(path).map_err(|()| ErrorKind::RelativePath(path.to_path_buf()).into())
}

fn base_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}

/// A file on the source filesystem, possibly not yet read.
#[derive(Clone)]
pub struct SourceBlob {
    path: PathBuf,
    name: String,
    location: Url,
    loaded: Option<Loaded>,
}

impl SourceBlob {
    /// Create an unloaded blob for `path`.
    ///
    /// Relative paths are made absolute against the current directory (no
    /// filesystem access is performed).
    pub fn new(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let path = std::path::absolute(&path).or_raise(|| ErrorKind::RelativePath(path.clone()))?;
        Ok(Self {
            location: location_of(&path)?,
            name: base_name(&path),
            path,
            loaded: None,
        })
    }

    /// Create an already-loaded blob from in-memory content.
    pub fn with_content(path: impl Into<PathBuf>, content: Vec<u8>) -> Result<Self> {
        let mut blob = Self::new(path)?;
        blob.set_content(content);
        Ok(blob)
    }

    fn set_content(&mut self, content: Vec<u8>) {
        let fingerprint = Fingerprint::compute(&content);
        self.loaded = Some(Loaded { content, fingerprint });
    }

    /// Read the whole file into memory and fingerprint it.
    ///
    /// Loading an already loaded blob is a no-op. A failed read leaves the
    /// blob unloaded.
    pub async fn load(&mut self) -> Result<()> {
        if self.loaded.is_some() {
            return Ok(());
        }
        let content = tokio::fs::read(&self.path).await.or_raise(|| ErrorKind::Read(self.path.clone()))?;
        self.set_content(content);
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some()
    }

    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        self.loaded.as_ref().map(|l| &l.fingerprint)
    }

    pub fn content(&self) -> Option<&[u8]> {
        self.loaded.as_ref().map(|l| l.content.as_slice())
    }

    /// Content length in bytes; zero until loaded.
    pub fn size(&self) -> u64 {
        self.loaded.as_ref().map_or(0, |l| l.content.len() as u64)
    }
}

impl Debug for SourceBlob {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("SourceBlob")
            .field("path", &self.path)
            .field("size", &self.size())
            .field("fingerprint", &self.fingerprint())
            .finish()
    }
}

/// A blob that has been written into a content-addressed store.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlob {
    directory: PathBuf,
    name: String,
    location: Url,
    size: u64,
    fingerprint: Fingerprint,
}

impl StoredBlob {
    /// `directory` is the sharded target directory holding the `meta` and
    /// `blob` files. It must be absolute.
    pub fn new(
        directory: impl Into<PathBuf>,
        name: impl Into<String>,
        size: u64,
        fingerprint: Fingerprint,
    ) -> Result<Self> {
        let directory = directory.into();
        Ok(Self {
            location: location_of(&directory)?,
            directory,
            name: name.into(),
            size,
            fingerprint,
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    pub fn blob_path(&self) -> PathBuf {
        self.directory.join(BLOB_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.directory.join(META_FILE)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn location(&self) -> &Url {
        &self.location
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }
}

/// The unit of content flowing through the pipelines.
///
/// Exactly two variants: a [`SourceBlob`] (from a walker, loaded by a
/// loader) and a [`StoredBlob`] (emitted by the store pipeline).
#[derive(Clone, Debug)]
pub enum Blob {
    Source(SourceBlob),
    Stored(StoredBlob),
}

impl Blob {
    /// Content address; absent for a source blob that was never loaded.
    pub fn fingerprint(&self) -> Option<&Fingerprint> {
        match self {
            Self::Source(blob) => blob.fingerprint(),
            Self::Stored(blob) => Some(blob.fingerprint()),
        }
    }

    pub fn size(&self) -> u64 {
        match self {
            Self::Source(blob) => blob.size(),
            Self::Stored(blob) => blob.size(),
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Source(blob) => blob.name(),
            Self::Stored(blob) => blob.name(),
        }
    }

    pub fn location(&self) -> &Url {
        match self {
            Self::Source(blob) => blob.location(),
            Self::Stored(blob) => blob.location(),
        }
    }

    /// Open the blob's bytes for reading.
    ///
    /// Source blobs are read from memory and must be loaded first. Stored
    /// blobs open their `blob` file.
    pub fn reader(&self) -> Result<BoxSyncRead<'_>> {
        match self {
            Self::Source(blob) => match blob.content() {
                Some(content) => Ok(Box::new(Cursor::new(content))),
                None => exn::bail!(ErrorKind::NotLoaded(blob.path().to_path_buf())),
            },
            Self::Stored(blob) => {
                let path = blob.blob_path();
                let file = File::open(&path).or_raise(|| ErrorKind::Read(path.clone()))?;
                Ok(Box::new(file))
            },
        }
    }

    pub fn as_source(&self) -> Option<&SourceBlob> {
        match self {
            Self::Source(blob) => Some(blob),
            Self::Stored(_) => None,
        }
    }

    pub fn as_stored(&self) -> Option<&StoredBlob> {
        match self {
            Self::Stored(blob) => Some(blob),
            Self::Source(_) => None,
        }
    }
}

impl From<SourceBlob> for Blob {
    fn from(blob: SourceBlob) -> Self {
        Self::Source(blob)
    }
}

impl From<StoredBlob> for Blob {
    fn from(blob: StoredBlob) -> Self {
        Self::Stored(blob)
    }
}
