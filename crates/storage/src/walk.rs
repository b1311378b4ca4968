//! Recursive directory walker feeding the loader pool.

use crate::Skip;
use async_channel::Sender;
use hoard_blob::ProcessStatus;
use std::path::{Path, PathBuf};
use tokio::fs::{self, DirEntry};

enum WalkEntry {
    File(PathBuf),
    Descend(PathBuf),
    Skipped,
}

/// Walk everything below `root`, pushing file paths into `paths`.
///
/// Entries matching `skip` are counted as skipped and never descended into or
/// emitted; skipped files also add their (already known) size to the skip
/// size. Directories that can't be opened or read count one error and only
/// lose their own subtree. `root` itself is never tested against `skip`.
///
/// Pushing blocks while the loaders are busy; that is the backpressure for
/// the whole pipeline. Returns early if every loader has gone away.
pub async fn walk(root: &Path, skip: &Skip, paths: &Sender<PathBuf>, status: &ProcessStatus) {
    let mut stack = vec![root.to_path_buf()];
    'dirs: while let Some(current) = stack.pop() {
        tracing::debug!(path = %current.display(), "Scanning directory");
        let mut entries = match fs::read_dir(&current).await {
            Ok(entries) => entries,
            Err(error) => {
                status.add_error_count(1);
                tracing::error!(path = %current.display(), %error, "Failed to open directory");
                continue 'dirs;
            },
        };
        'entries: loop {
            let entry = match entries.next_entry().await {
                Ok(Some(entry)) => entry,
                Ok(None) => break 'entries,
                // The iterator can't be trusted past an error; give up on the
                // rest of this directory.
                Err(error) => {
                    status.add_error_count(1);
                    tracing::error!(path = %current.display(), %error, "Failed to read directory");
                    break 'entries;
                },
            };
            match process_entry(entry, skip, status).await {
                WalkEntry::File(path) => {
                    if paths.send(path).await.is_err() {
                        tracing::error!("Every loader has exited; abandoning walk");
                        return;
                    }
                },
                WalkEntry::Descend(dir) => stack.push(dir),
                WalkEntry::Skipped => {},
            }
        }
        tracing::debug!(path = %current.display(), "Finished scanning directory");
    }
}

async fn process_entry(entry: DirEntry, skip: &Skip, status: &ProcessStatus) -> WalkEntry {
    let path = entry.path();
    if skip.matches(&path) {
        skip_entry(&entry, &path, status).await;
        return WalkEntry::Skipped;
    }
    match entry.file_type().await {
        Ok(file_type) if file_type.is_dir() => WalkEntry::Descend(path),
        // Symlinks and other non-directories go to the loaders, which follow
        // links and count whatever can't be read as an error.
        Ok(_) => WalkEntry::File(path),
        Err(error) => {
            status.add_error_count(1);
            tracing::error!(path = %path.display(), %error, "Failed to determine file type");
            WalkEntry::Skipped
        },
    }
}

async fn skip_entry(entry: &DirEntry, path: &Path, status: &ProcessStatus) {
    status.add_skip_count(1);
    match entry.metadata().await {
        Ok(metadata) if metadata.is_dir() => {
            tracing::info!(path = %path.display(), "Skipped directory");
        },
        Ok(metadata) => {
            status.add_skip_size(metadata.len());
            tracing::info!(path = %path.display(), size = metadata.len(), "Skipped file");
        },
        // Still skipped, just without a size to report.
        Err(error) => tracing::warn!(path = %path.display(), %error, "Skipped entry with unreadable metadata"),
    }
}
