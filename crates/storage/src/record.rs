use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use hoard_blob::{Fingerprint, META_FILE};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Contents of the `meta` file written next to every stored `blob`.
///
/// ```json
/// {"content-hash":"sha1:aaf4c61ddcc5e8a2dabede0f3b482cd9aea9434d","size":5,"filename":"a.txt"}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    #[serde(rename = "content-hash")]
    pub content_hash: Fingerprint,
    pub size: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl StoredRecord {
    pub fn new(content_hash: Fingerprint, size: u64, filename: &str) -> Self {
        Self {
            content_hash,
            size,
            filename: (!filename.is_empty()).then(|| filename.to_string()),
        }
    }

    pub fn to_json(&self) -> Result<Vec<u8>> {
        let meta = Path::new(META_FILE);
        serde_json::to_vec(self).or_raise(|| ErrorKind::Record(meta.to_path_buf()))
    }

    /// Read the record stored in the blob directory `directory`.
    pub async fn read(directory: &Path) -> Result<Self> {
        let path = directory.join(META_FILE);
        let bytes = tokio::fs::read(&path).await.or_raise(|| ErrorKind::Record(path.clone()))?;
        serde_json::from_slice(&bytes).or_raise(|| ErrorKind::Record(path))
    }
}
