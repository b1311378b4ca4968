//! Load, classify and record a directory tree.

use crate::error::{ErrorKind, Result};
use exn::ResultExt;
use hoard_blob::{Fingerprint, StatusSnapshot};
use hoard_classify::{BlobMeta, Classifier};
use hoard_index::{Database, IndexWriter, NewEntry};
use hoard_storage::FileSystem;
use std::path::Path;
use time::OffsetDateTime;

/// What one [`index`] run did.
#[derive(Debug)]
pub struct IndexReport {
    /// Counters of the load run that fed the classifier.
    pub load: StatusSnapshot,
    /// Files classified and handed to the index.
    pub classified: u64,
    /// Files that could not be classified or turned into an index row.
    pub failed: u64,
    /// Rows actually inserted; paths already indexed are ignored.
    pub inserted: u64,
}

/// Walks `source` with the loaders of `fs`, classifies every loaded file and
/// writes one index row per path in batches of `batch_size`.
///
/// Per-file failures are logged and counted in [`IndexReport::failed`]; only
/// a failing index write aborts the run.
#[tracing::instrument(skip_all, fields(source = %source.as_ref().display()))]
pub async fn index(
    fs: &FileSystem,
    classifier: &Classifier,
    db: &Database,
    batch_size: usize,
    source: impl AsRef<Path>,
) -> Result<IndexReport> {
    let mut writer = IndexWriter::new(db, batch_size).or_raise(|| ErrorKind::Index)?;
    let status = fs.load(source.as_ref());
    let results = classifier.results(status.blobs());

    let (mut classified, mut failed) = (0, 0);
    while let Ok(result) = results.recv().await {
        let meta = match result {
            Ok(meta) => meta,
            Err(err) => {
                // A stray line belongs to no file.
                if !err.is_stray_line() {
                    failed += 1;
                }
                tracing::warn!(error = ?err, "Classification failed");
                continue;
            },
        };
        match entry_of(&meta).await {
            Some(entry) => {
                writer.push(entry).await.or_raise(|| ErrorKind::Index)?;
                classified += 1;
            },
            None => {
                failed += 1;
                tracing::warn!(path = %meta.path().display(), id = meta.id(), "Classified file is missing attributes");
            },
        }
    }
    let inserted = writer.finish().await.or_raise(|| ErrorKind::Index)?;

    status.wait().await;
    let load = status.snapshot().or_raise(|| ErrorKind::Index)?;
    tracing::info!(loaded = load.count, classified, failed, inserted, "Index run complete");
    Ok(IndexReport { load, classified, failed, inserted })
}

async fn entry_of(meta: &BlobMeta) -> Option<NewEntry> {
    let fingerprint: Fingerprint = meta.id().parse().ok()?;
    let entry = NewEntry::new(fingerprint.hex(), meta.path(), meta.size()?, meta.mime_type()?);
    let modified = tokio::fs::metadata(meta.path()).await.and_then(|m| m.modified());
    Some(match modified {
        Ok(modified) => entry.with_mod_time(OffsetDateTime::from(modified)),
        Err(_) => entry,
    })
}
