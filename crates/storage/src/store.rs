//! Saver workers: the content-addressed write path.

use crate::error::{Error, ErrorKind, Result};
use crate::path::shard;
use crate::record::StoredRecord;
use async_channel::Receiver;
use dashmap::DashMap;
use exn::ResultExt;
use hoard_blob::{BLOB_FILE, Blob, Fingerprint, StatusHandle, StoredBlob};
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::OnceCell;

/// What happened to a single blob.
#[derive(Debug)]
pub(crate) enum Saved {
    Written(StoredBlob),
    Duplicate,
}

/// State shared by every saver of one run.
#[derive(Clone)]
pub(crate) struct Saver {
    root: PathBuf,
    verify_existing: bool,
    // One cell per fingerprint seen this run, set once its content is stored.
    claims: Arc<DashMap<Fingerprint, Arc<OnceCell<()>>>>,
}

impl Saver {
    pub(crate) fn new(root: PathBuf, verify_existing: bool) -> Self {
        Self { root, verify_existing, claims: Arc::new(DashMap::new()) }
    }

    /// One saver. Runs until `blobs` is closed and drained.
    pub(crate) async fn run(self, worker: usize, blobs: Receiver<Blob>, status: StatusHandle) {
        tracing::debug!(saver = worker, "Saver started");
        while let Ok(blob) = blobs.recv().await {
            let size = blob.size();
            match self.save(&blob).await {
                Ok(Saved::Written(stored)) => {
                    status.add_count(1);
                    status.add_size(size);
                    tracing::trace!(
                        saver = worker,
                        name = blob.name(),
                        content_hash = stored.fingerprint().composite(),
                        size,
                        "Stored blob"
                    );
                    if !status.emit(stored).await {
                        break;
                    }
                },
                Ok(Saved::Duplicate) => {
                    status.add_skip_count(1);
                    status.add_skip_size(size);
                    tracing::debug!(saver = worker, name = blob.name(), size, "Blob already stored");
                },
                Err(err) => {
                    status.add_error_count(1);
                    tracing::error!(saver = worker, location = %blob.location(), error = ?err, "Failed to store blob");
                },
            }
        }
        tracing::debug!(saver = worker, "Saver finished");
    }

    pub(crate) async fn save(&self, blob: &Blob) -> Result<Saved> {
        let Some(fingerprint) = blob.fingerprint() else {
            exn::bail!(ErrorKind::NotLoaded(blob.location().to_string()));
        };

        // Equal fingerprints in flight at the same time: one writes, the rest
        // wait for it. A failed write leaves the cell empty for the next one.
        let claim = self.claims.entry(fingerprint.clone()).or_default().clone();
        let mut written = None;
        let slot = &mut written;
        claim
            .get_or_try_init(move || async move {
                *slot = self.write(blob, fingerprint).await?;
                Ok::<_, Error>(())
            })
            .await?;
        Ok(written.map_or(Saved::Duplicate, Saved::Written))
    }

    /// Writes `blob` into its shard unless the store already holds it.
    async fn write(&self, blob: &Blob, fingerprint: &Fingerprint) -> Result<Option<StoredBlob>> {
        let directory = shard(&self.root, fingerprint);
        let blob_path = directory.join(BLOB_FILE);
        if self.already_stored(&blob_path, blob.size(), fingerprint).await {
            return Ok(None);
        }

        let content = content_of(blob).await?;
        fs::create_dir_all(&directory).await.or_raise(|| ErrorKind::Write(directory.clone()))?;
        // The meta file goes first; a failed blob write leaves it behind.
        let record = StoredRecord::new(fingerprint.clone(), blob.size(), blob.name());
        let meta_path = directory.join(hoard_blob::META_FILE);
        fs::write(&meta_path, record.to_json()?).await.or_raise(|| ErrorKind::Write(meta_path.clone()))?;
        fs::write(&blob_path, &content).await.or_raise(|| ErrorKind::Write(blob_path.clone()))?;

        let stored =
            StoredBlob::new(directory, blob.name(), blob.size(), fingerprint.clone()).or_raise(|| ErrorKind::Blob)?;
        Ok(Some(stored))
    }

    /// The dedup oracle: a `blob` file of the same size already exists.
    async fn already_stored(&self, blob_path: &Path, size: u64, fingerprint: &Fingerprint) -> bool {
        match fs::metadata(blob_path).await {
            Ok(metadata) if metadata.is_file() && metadata.len() == size => {},
            _ => return false,
        }
        if !self.verify_existing {
            return true;
        }
        match fs::read(blob_path).await {
            Ok(existing) if Fingerprint::compute(&existing) == *fingerprint => true,
            Ok(_) => {
                tracing::warn!(path = %blob_path.display(), "Stored blob does not match its address; rewriting");
                false
            },
            Err(error) => {
                tracing::warn!(path = %blob_path.display(), %error, "Failed to verify stored blob; rewriting");
                false
            },
        }
    }
}

async fn content_of(blob: &Blob) -> Result<Cow<'_, [u8]>> {
    match blob {
        Blob::Source(source) => match source.content() {
            Some(content) => Ok(Cow::Borrowed(content)),
            None => exn::bail!(ErrorKind::NotLoaded(blob.location().to_string())),
        },
        // Moving a blob between stores.
        Blob::Stored(stored) => {
            let path = stored.blob_path();
            let content = fs::read(&path).await.or_raise(|| ErrorKind::Blob)?;
            Ok(Cow::Owned(content))
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_blob::{META_FILE, SourceBlob};

    fn loaded(path: &str, content: &[u8]) -> Blob {
        SourceBlob::with_content(path, content.to_vec()).unwrap().into()
    }

    #[tokio::test]
    async fn test_save_writes_meta_and_blob() {
        let dir = tempfile::tempdir().unwrap();
        let saver = Saver::new(dir.path().to_path_buf(), false);
        let Saved::Written(stored) = saver.save(&loaded("/src/a.txt", b"hello")).await.unwrap() else {
            panic!("expected a write");
        };
        assert_eq!(stored.directory(), shard(dir.path(), &Fingerprint::compute(b"hello")));
        assert_eq!(std::fs::read(stored.blob_path()).unwrap(), b"hello");
        assert!(stored.directory().join(META_FILE).is_file());
        let record = StoredRecord::read(stored.directory()).await.unwrap();
        assert_eq!(record.filename.as_deref(), Some("a.txt"));
        assert_eq!(record.size, 5);
    }

    #[tokio::test]
    async fn test_existing_blob_of_same_size_is_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let blob = loaded("/src/a.txt", b"hello");
        Saver::new(dir.path().to_path_buf(), false).save(&blob).await.unwrap();
        // A new run has its own claims, so this exercises the disk check.
        let saved = Saver::new(dir.path().to_path_buf(), false).save(&blob).await.unwrap();
        assert!(matches!(saved, Saved::Duplicate));
    }

    #[tokio::test]
    async fn test_in_run_duplicate_is_claimed_once() {
        let dir = tempfile::tempdir().unwrap();
        let saver = Saver::new(dir.path().to_path_buf(), false);
        assert!(matches!(saver.save(&loaded("/src/a", b"same")).await.unwrap(), Saved::Written(_)));
        assert!(matches!(saver.save(&loaded("/src/b", b"same")).await.unwrap(), Saved::Duplicate));
    }

    #[tokio::test]
    async fn test_failed_claim_lets_duplicate_write() {
        let dir = tempfile::tempdir().unwrap();
        let saver = Saver::new(dir.path().to_path_buf(), false);
        let fingerprint = Fingerprint::compute(b"same");
        let missing = StoredBlob::new(dir.path().join("elsewhere"), "a", 4, fingerprint.clone()).unwrap();
        let err = saver.save(&Blob::from(missing)).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Blob));

        assert!(matches!(saver.save(&loaded("/src/b", b"same")).await.unwrap(), Saved::Written(_)));
        assert!(matches!(saver.save(&loaded("/src/c", b"same")).await.unwrap(), Saved::Duplicate));
        assert_eq!(std::fs::read(shard(dir.path(), &fingerprint).join(BLOB_FILE)).unwrap(), b"same");
    }

    #[tokio::test]
    async fn test_blob_write_failure_leaves_meta() {
        let dir = tempfile::tempdir().unwrap();
        let blob = loaded("/src/a.txt", b"hello");
        let target = shard(dir.path(), blob.fingerprint().unwrap());
        std::fs::create_dir_all(target.join(BLOB_FILE)).unwrap();

        let err = Saver::new(dir.path().to_path_buf(), false).save(&blob).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::Write(p) if *p == target.join(BLOB_FILE)));
        assert!(target.join(META_FILE).is_file());
        assert!(!target.join(BLOB_FILE).is_file());
    }

    #[tokio::test]
    async fn test_size_mismatch_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let blob = loaded("/src/a.txt", b"hello");
        let target = shard(dir.path(), blob.fingerprint().unwrap());
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join(BLOB_FILE), b"hel").unwrap();
        let saved = Saver::new(dir.path().to_path_buf(), false).save(&blob).await.unwrap();
        assert!(matches!(saved, Saved::Written(_)));
        assert_eq!(std::fs::read(target.join(BLOB_FILE)).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_verify_existing_catches_corruption() {
        let dir = tempfile::tempdir().unwrap();
        let blob = loaded("/src/a.txt", b"hello");
        let target = shard(dir.path(), blob.fingerprint().unwrap());
        std::fs::create_dir_all(&target).unwrap();
        std::fs::write(target.join(BLOB_FILE), b"jello").unwrap();

        let trusting = Saver::new(dir.path().to_path_buf(), false);
        assert!(matches!(trusting.save(&blob).await.unwrap(), Saved::Duplicate));
        let verifying = Saver::new(dir.path().to_path_buf(), true);
        assert!(matches!(verifying.save(&blob).await.unwrap(), Saved::Written(_)));
        assert_eq!(std::fs::read(target.join(BLOB_FILE)).unwrap(), b"hello");
    }

    #[tokio::test]
    async fn test_unloaded_blob_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let blob = Blob::from(SourceBlob::new("/src/a.txt").unwrap());
        let err = Saver::new(dir.path().to_path_buf(), false).save(&blob).await.unwrap_err();
        assert!(matches!(&*err, ErrorKind::NotLoaded(_)));
    }

    #[tokio::test]
    async fn test_stored_blob_moves_between_stores() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();
        let Saved::Written(stored) =
            Saver::new(first.path().to_path_buf(), false).save(&loaded("/src/x", b"moved")).await.unwrap()
        else {
            panic!("expected a write");
        };
        let Saved::Written(moved) =
            Saver::new(second.path().to_path_buf(), false).save(&Blob::from(stored)).await.unwrap()
        else {
            panic!("expected a write");
        };
        assert!(moved.directory().starts_with(second.path()));
        assert_eq!(std::fs::read(moved.blob_path()).unwrap(), b"moved");
    }
}
