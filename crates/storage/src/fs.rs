//! Local filesystem source and content-addressed store.

use crate::error::{ErrorKind, Result};
use crate::load::loader;
use crate::store::Saver;
use crate::walk::walk;
use crate::{MAX_WORKERS, MIN_WORKERS, Skip};
use async_channel::Receiver;
use exn::ResultExt;
use hoard_blob::{Blob, ProcessStatus, StatusHandle};
use std::fs::create_dir_all as sync_create_dir;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Default number of loader and saver workers.
pub const DEFAULT_WORKERS: usize = 4;

fn validate_pool(what: &'static str, value: usize) -> Result<usize> {
    if !(MIN_WORKERS..=MAX_WORKERS).contains(&value) {
        exn::bail!(ErrorKind::PoolSize { what, value });
    }
    Ok(value)
}

/// Loads files from directory trees and stores blobs under a single root.
///
/// Both [`load`](Self::load) and [`store`](Self::store) return immediately
/// with a [`StatusHandle`]; the work runs on the current Tokio runtime and
/// the handle reports `done` once every worker has exited.
///
/// # Examples
///
/// ```no_run
/// use hoard_storage::FileSystem;
///
/// # async fn example() {
/// let fs = FileSystem::new("/var/hoard", 4, 4).unwrap();
/// let loaded = fs.load("/home/me/Pictures");
/// let stored = fs.store(loaded.blobs());
/// let relocated = stored.blobs();
/// while relocated.recv().await.is_ok() {}
/// stored.wait().await;
/// println!("{}", stored.to_json().unwrap());
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct FileSystem {
    root: PathBuf,
    max_saver: usize,
    max_loader: usize,
    skip: Skip,
    verify_existing: bool,
}

impl FileSystem {
    /// Create a filesystem rooted at `root` (created if missing).
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::PoolSize`] if either pool size is outside of
    /// [`MIN_WORKERS`]..=[`MAX_WORKERS`], and [`ErrorKind::InvalidRoot`] if
    /// `root` can't be made absolute or is not a directory.
    pub fn new(root: impl AsRef<Path>, max_saver: usize, max_loader: usize) -> Result<Self> {
        let max_saver = validate_pool("max_saver", max_saver)?;
        let max_loader = validate_pool("max_loader", max_loader)?;
        let root = root.as_ref();
        let root = std::path::absolute(root).or_raise(|| ErrorKind::InvalidRoot(root.to_path_buf()))?;
        if root.exists() {
            if !root.is_dir() {
                exn::bail!(ErrorKind::InvalidRoot(root));
            }
        } else {
            // Only ever happens once, at construction.
            sync_create_dir(&root).or_raise(|| ErrorKind::InvalidRoot(root.clone()))?;
        }
        Ok(Self { root, max_saver, max_loader, skip: Skip::default(), verify_existing: false })
    }

    /// Replace the skip predicate used by [`load`](Self::load).
    #[must_use]
    pub fn with_skip(mut self, skip: Skip) -> Self {
        self.skip = skip;
        self
    }

    /// Re-hash existing blobs whose size matches before counting them as
    /// duplicates.
    #[must_use]
    pub fn with_verify_existing(mut self, verify: bool) -> Self {
        self.verify_existing = verify;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn max_saver(&self) -> usize {
        self.max_saver
    }

    pub fn max_loader(&self) -> usize {
        self.max_loader
    }

    /// Walk `source` and load every file that isn't skipped.
    ///
    /// Loaded blobs are pushed into the returned status' queue, which must be
    /// drained for the run to make progress.
    pub fn load(&self, source: impl Into<PathBuf>) -> StatusHandle {
        let source = source.into();
        let status: StatusHandle = Arc::new(ProcessStatus::load());
        let span = tracing::info_span!("load", id = status.id(), source = %source.display());
        let (paths, queue) = async_channel::bounded::<PathBuf>(1);

        let mut workers = JoinSet::new();
        for worker in 0..self.max_loader {
            workers.spawn(loader(worker, queue.clone(), status.clone()).instrument(span.clone()));
        }
        drop(queue);

        let skip = self.skip.clone();
        let driver = status.clone();
        tokio::spawn(
            async move {
                tracing::info!("Load started");
                walk(&source, &skip, &paths, &driver).await;
                // Closing the path queue is what tells the loaders to stop.
                drop(paths);
                join_all(workers, &driver).await;
                driver.finish();
                tracing::info!(
                    count = driver.count(),
                    size = driver.size(),
                    skip_count = driver.skip_count(),
                    error_count = driver.error_count(),
                    "Load finished"
                );
            }
            .instrument(span),
        );
        status
    }

    /// Store every blob received from `blobs` until it is closed.
    ///
    /// Relocated blobs are pushed into the returned status' queue, which must
    /// be drained for the run to make progress.
    pub fn store(&self, blobs: Receiver<Blob>) -> StatusHandle {
        let status: StatusHandle = Arc::new(ProcessStatus::store());
        let span = tracing::info_span!("store", id = status.id(), root = %self.root.display());
        let saver = Saver::new(self.root.clone(), self.verify_existing);

        let mut workers = JoinSet::new();
        for worker in 0..self.max_saver {
            workers.spawn(saver.clone().run(worker, blobs.clone(), status.clone()).instrument(span.clone()));
        }

        let driver = status.clone();
        tokio::spawn(
            async move {
                tracing::info!("Store started");
                join_all(workers, &driver).await;
                driver.finish();
                tracing::info!(
                    count = driver.count(),
                    size = driver.size(),
                    skip_count = driver.skip_count(),
                    error_count = driver.error_count(),
                    "Store finished"
                );
            }
            .instrument(span),
        );
        status
    }
}

async fn join_all(mut workers: JoinSet<()>, status: &ProcessStatus) {
    while let Some(joined) = workers.join_next().await {
        if let Err(error) = joined {
            status.add_error_count(1);
            tracing::error!(%error, "Worker panicked");
        }
    }
}
