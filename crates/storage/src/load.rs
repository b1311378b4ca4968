//! Loader workers: read each walked path into memory and fingerprint it.

use async_channel::Receiver;
use hoard_blob::{SourceBlob, StatusHandle};
use std::path::PathBuf;

/// One loader. Runs until `paths` is closed and drained.
///
/// Every path is tried exactly once; a path that can't be read is counted as
/// an error and dropped.
pub(crate) async fn loader(worker: usize, paths: Receiver<PathBuf>, status: StatusHandle) {
    tracing::debug!(loader = worker, "Loader started");
    while let Ok(path) = paths.recv().await {
        let mut blob = match SourceBlob::new(&path) {
            Ok(blob) => blob,
            Err(err) => {
                status.add_error_count(1);
                tracing::error!(loader = worker, path = %path.display(), error = ?err, "Invalid source path");
                continue;
            },
        };
        if let Err(err) = blob.load().await {
            status.add_error_count(1);
            tracing::error!(loader = worker, path = %path.display(), error = ?err, "Failed to load file");
            continue;
        }
        status.add_count(1);
        status.add_size(blob.size());
        tracing::trace!(
            loader = worker,
            path = %path.display(),
            size = blob.size(),
            content_hash = blob.fingerprint().map(|fp| fp.composite()),
            "Loaded file"
        );
        if !status.emit(blob).await {
            break;
        }
    }
    tracing::debug!(loader = worker, "Loader finished");
}

#[cfg(test)]
mod tests {
    use super::*;
    use hoard_blob::{Fingerprint, ProcessStatus};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_loader_emits_and_counts() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a"), b"hello").unwrap();
        let status: StatusHandle = Arc::new(ProcessStatus::load());
        let (tx, rx) = async_channel::unbounded();
        tx.send(dir.path().join("a")).await.unwrap();
        tx.send(dir.path().join("missing")).await.unwrap();
        drop(tx);

        let worker = tokio::spawn(loader(0, rx, status.clone()));
        let blob = status.blobs().recv().await.unwrap();
        worker.await.unwrap();

        assert_eq!(blob.fingerprint(), Some(&Fingerprint::compute(b"hello")));
        assert_eq!(status.count(), 1);
        assert_eq!(status.size(), 5);
        assert_eq!(status.error_count(), 1);
    }
}
