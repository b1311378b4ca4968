//! Batch dispatch, per-batch detection and fan-in.

use crate::detector::Detector;
use crate::error::{Error, ErrorKind, Result};
use crate::meta::{self, BlobMeta};
use crate::parse::{MimeType, lines, split_line};
use async_channel::{Receiver, Sender};
use exn::ResultExt;
use hoard_blob::Blob;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::NamedTempFile;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::Instrument;

/// Default number of blobs per classifier invocation.
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// Default number of batches classified at the same time.
pub const DEFAULT_MAX_IN_FLIGHT: usize = 8;

const LISTING_PREFIX: &str = "detect-file-mime-";

/// One entry of the result stream: a classified blob, or why something
/// (an item of a batch, a whole batch, a single response line) failed.
pub type Classified = Result<BlobMeta>;

/// Groups blobs into batches and classifies each batch with one pair of
/// [`Detector`] calls.
#[derive(Clone)]
pub struct Classifier {
    detector: Arc<dyn Detector>,
    batch_size: usize,
    max_in_flight: usize,
    work_dir: Option<PathBuf>,
}

impl Classifier {
    pub fn new(detector: Arc<dyn Detector>) -> Self {
        Self {
            detector,
            batch_size: DEFAULT_BATCH_SIZE,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            work_dir: None,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            exn::bail!(ErrorKind::InvalidLimit("batch_size"));
        }
        self.batch_size = batch_size;
        Ok(self)
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Result<Self> {
        if max_in_flight == 0 {
            exn::bail!(ErrorKind::InvalidLimit("max_in_flight"));
        }
        self.max_in_flight = max_in_flight;
        Ok(self)
    }

    /// Directory for the temporary path listings; the system temp directory
    /// when unset.
    #[must_use]
    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = Some(work_dir.into());
        self
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight
    }

    /// Classify every blob received from `blobs`, successes and failures alike.
    ///
    /// Every blob yields exactly one entry. Response lines that match no blob
    /// of their batch yield an extra [`ErrorKind::UnmatchedLine`] entry each.
    /// The stream ends once `blobs` is closed and every batch has completed.
    pub fn results(&self, blobs: Receiver<Blob>) -> Receiver<Classified> {
        let (results, stream) = async_channel::bounded(self.batch_size);
        let dispatcher = self.clone();
        tokio::spawn(
            async move { dispatcher.dispatch(blobs, results).await }.instrument(tracing::info_span!("classify")),
        );
        stream
    }

    /// Classify every blob received from `blobs`, keeping only successes.
    ///
    /// Failures are logged. The stream ends after the last batch completes.
    pub fn classify(&self, blobs: Receiver<Blob>) -> Receiver<BlobMeta> {
        let results = self.results(blobs);
        let (output, stream) = async_channel::bounded(1);
        tokio::spawn(fan_in(results, output));
        stream
    }

    async fn dispatch(self, blobs: Receiver<Blob>, results: Sender<Classified>) {
        let permits = Arc::new(Semaphore::new(self.max_in_flight));
        let mut tasks = JoinSet::new();
        let mut batch = Vec::with_capacity(self.batch_size);
        let mut dispatched = 0_usize;
        let mut closed = false;
        while !closed {
            match blobs.recv().await {
                Ok(blob) => batch.push(blob),
                Err(_) => closed = true,
            }
            let full = batch.len() >= self.batch_size;
            if !full && !(closed && !batch.is_empty()) {
                continue;
            }
            // The semaphore is never closed, so acquiring can't fail.
            let Ok(permit) = permits.clone().acquire_owned().await else {
                break;
            };
            let items = std::mem::replace(&mut batch, Vec::with_capacity(self.batch_size));
            let task = BatchTask {
                detector: self.detector.clone(),
                work_dir: self.work_dir.clone(),
                results: results.clone(),
            };
            let span = tracing::debug_span!("batch", batch = dispatched, items = items.len());
            tasks.spawn(
                async move {
                    task.run(items).await;
                    drop(permit);
                }
                .instrument(span),
            );
            dispatched += 1;
        }
        while let Some(joined) = tasks.join_next().await {
            if let Err(error) = joined {
                tracing::error!(%error, "Classification task panicked");
            }
        }
        tracing::info!(batches = dispatched, "Classification finished");
        // Dropping the last sender closes the result stream.
        drop(results);
    }
}

async fn fan_in(results: Receiver<Classified>, output: Sender<BlobMeta>) {
    let (mut classified, mut failed) = (0_u64, 0_u64);
    while let Ok(result) = results.recv().await {
        match result {
            Ok(meta) => {
                classified += 1;
                if output.send(meta).await.is_err() {
                    tracing::warn!("Classification output dropped; discarding remaining results");
                    break;
                }
            },
            Err(err) => {
                failed += 1;
                tracing::warn!(error = ?err, "Failed to detect file type");
            },
        }
    }
    tracing::debug!(classified, failed, "Classification output closed");
}

struct BatchTask {
    detector: Arc<dyn Detector>,
    work_dir: Option<PathBuf>,
    results: Sender<Classified>,
}

/// Per-batch reassociation state. Built before any detection starts and only
/// touched by its own task.
struct Pending {
    items: HashMap<String, Item>,
}

struct Item {
    meta: BlobMeta,
    mime_seen: bool,
    failure: Option<Error>,
}

impl BatchTask {
    async fn run(self, blobs: Vec<Blob>) {
        let mut pending = Pending { items: HashMap::with_capacity(blobs.len()) };
        for blob in &blobs {
            match seed(blob) {
                Ok((path, meta)) if pending.items.contains_key(&path) => {
                    let err = ErrorKind::Unclassifiable(format!("{path} is listed twice in one batch"));
                    tracing::debug!(path = %path, id = meta.id(), "Duplicate path in batch");
                    self.send(Err(err.into())).await;
                },
                Ok((path, meta)) => {
                    pending.items.insert(path, Item { meta, mime_seen: false, failure: None });
                },
                Err(err) => self.send(Err(err)).await,
            }
        }
        if pending.items.is_empty() {
            return;
        }

        let listing = match self.write_listing(pending.items.keys()).await {
            Ok(listing) => listing,
            Err(err) => return self.fail_listing(pending, err).await,
        };
        let mime = match self.detector.mime(listing.path()).await {
            Ok(output) => output,
            Err(err) => return self.fail_batch(pending, err).await,
        };
        let description = match self.detector.describe(listing.path()).await {
            Ok(output) => output,
            Err(err) => return self.fail_batch(pending, err).await,
        };
        drop(listing);

        for line in lines(&mime) {
            let Some((path, value)) = split_line(line, &pending.items) else {
                self.send(Err(ErrorKind::UnmatchedLine(line.to_string()).into())).await;
                continue;
            };
            let Some(item) = pending.items.get_mut(path) else {
                continue;
            };
            item.mime_seen = true;
            match MimeType::parse(value) {
                Some(mime) => {
                    item.meta.insert(meta::FILETYPE_MIME_TYPE, mime.kind);
                    item.meta.insert(meta::FILETYPE_MIME_SUBTYPE, mime.subtype);
                    item.meta.insert(meta::FILETYPE_MIME_ENCODING, mime.encoding);
                },
                None => item.failure = Some(ErrorKind::MalformedMime(line.to_string()).into()),
            }
        }
        for line in lines(&description) {
            let Some((path, value)) = split_line(line, &pending.items) else {
                self.send(Err(ErrorKind::UnmatchedLine(line.to_string()).into())).await;
                continue;
            };
            if let Some(item) = pending.items.get_mut(path)
                && !value.is_empty()
            {
                item.meta.insert(meta::FILETYPE_DESCRIPTION, value);
            }
        }

        for item in pending.items.into_values() {
            let result = match (item.failure, item.mime_seen) {
                (Some(failure), _) => Err(failure),
                (None, false) => Err(ErrorKind::MissingResult(item.meta.path().to_path_buf()).into()),
                (None, true) => Ok(item.meta),
            };
            self.send(result).await;
        }
    }

    async fn send(&self, result: Classified) {
        if self.results.send(result).await.is_err() {
            tracing::warn!("Classification results dropped");
        }
    }

    /// A failed invocation takes every item of the batch down with it.
    async fn fail_batch(&self, pending: Pending, err: Error) {
        tracing::warn!(error = ?err, items = pending.items.len(), "Classifier invocation failed");
        let reason = err.to_string();
        for item in pending.items.into_values() {
            let path = item.meta.path().display().to_string();
            self.send(Err(ErrorKind::Invocation(format!("{reason} (while classifying {path})")).into())).await;
        }
    }

    async fn fail_listing(&self, pending: Pending, err: Error) {
        tracing::warn!(error = ?err, items = pending.items.len(), "Failed to write path listing");
        for _ in pending.items.into_values() {
            self.send(Err(ErrorKind::Listing.into())).await;
        }
    }

    async fn write_listing(&self, paths: impl Iterator<Item = &String>) -> Result<NamedTempFile> {
        let body: String = paths.map(|path| format!("{path}\n")).collect();
        let work_dir = self.work_dir.clone();
        tokio::task::spawn_blocking(move || -> Result<NamedTempFile> {
            let mut builder = tempfile::Builder::new();
            builder.prefix(LISTING_PREFIX);
            let mut listing = match &work_dir {
                Some(dir) => builder.tempfile_in(dir),
                None => builder.tempfile(),
            }
            .or_raise(|| ErrorKind::Listing)?;
            listing.write_all(body.as_bytes()).or_raise(|| ErrorKind::Listing)?;
            listing.flush().or_raise(|| ErrorKind::Listing)?;
            Ok(listing)
        })
        .await
        .or_raise(|| ErrorKind::Listing)?
    }
}

/// Path handed to the classifier and the seeded record for `blob`.
fn seed(blob: &Blob) -> Result<(String, BlobMeta)> {
    let Some(fingerprint) = blob.fingerprint() else {
        exn::bail!(ErrorKind::Unclassifiable(format!("{} has not been loaded", blob.location())));
    };
    let path = classify_path(blob);
    let Some(listed) = path.to_str().filter(|p| !p.contains('\n')) else {
        exn::bail!(ErrorKind::Unclassifiable(format!("{} can not be listed", blob.location())));
    };
    let name = blob.name();
    let (kind, subtype) = meta::guess_mime(name);
    let mut record = BlobMeta::new(fingerprint.composite(), path.clone());
    record.insert(meta::FILENAME, name);
    record.insert(meta::FILEEXT, meta::file_ext(name));
    record.insert(meta::FILEEXT_MIME_TYPE, kind);
    record.insert(meta::FILEEXT_MIME_SUBTYPE, subtype);
    record.insert(meta::SIZE, i64::try_from(blob.size()).unwrap_or(i64::MAX));
    Ok((listed.to_string(), record))
}

fn classify_path(blob: &Blob) -> PathBuf {
    match blob {
        Blob::Source(source) => source.path().to_path_buf(),
        Blob::Stored(stored) => stored.blob_path(),
    }
}
