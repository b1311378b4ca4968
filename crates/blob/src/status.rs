//! Shared progress and result object for one asynchronous run.
//!
//! A [`ProcessStatus`] is handed back to the caller the moment a load or store
//! run starts. Workers bump its counters and push their output blobs into its
//! queue; the driving task calls [`finish`](ProcessStatus::finish) once every
//! worker has been joined. That closes the queue and fires the done signal,
//! exactly once.

use crate::Blob;
use crate::error::{ErrorKind, Result};
use async_channel::{Receiver, Sender};
use exn::ResultExt;
use serde::Serialize;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::sync::OnceLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;
use tokio::sync::watch;

const TIMESTAMP: &[BorrowedFormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]");
// Closest thing to a rendezvous queue: a sender waits until the previous item
// has been taken.
const QUEUE_CAPACITY: usize = 1;

/// Which kind of run a [`ProcessStatus`] is tracking.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ProcessKind {
    Load,
    Store,
}

impl Display for ProcessKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(match self {
            Self::Load => "load",
            Self::Store => "store",
        })
    }
}

/// Live counters, output queue and completion signal of a single run.
///
/// Counters only ever go up, and only through atomic adds. The `done` flag
/// flips from `false` to `true` exactly once, at which point the output queue
/// is closed and every [`wait`](Self::wait)er is released.
pub struct ProcessStatus {
    id: String,
    kind: ProcessKind,
    started_at: OffsetDateTime,
    started: Instant,
    finished: OnceLock<(OffsetDateTime, Duration)>,
    count: AtomicU64,
    size: AtomicU64,
    skip_count: AtomicU64,
    skip_size: AtomicU64,
    error_count: AtomicU64,
    sender: Sender<Blob>,
    receiver: Receiver<Blob>,
    done: AtomicBool,
    signal: watch::Sender<bool>,
}

impl ProcessStatus {
    pub fn new(id: impl Into<String>, kind: ProcessKind) -> Self {
        let (sender, receiver) = async_channel::bounded(QUEUE_CAPACITY);
        let (signal, _) = watch::channel(false);
        Self {
            id: id.into(),
            kind,
            started_at: OffsetDateTime::now_utc(),
            started: Instant::now(),
            finished: OnceLock::new(),
            count: AtomicU64::new(0),
            size: AtomicU64::new(0),
            skip_count: AtomicU64::new(0),
            skip_size: AtomicU64::new(0),
            error_count: AtomicU64::new(0),
            sender,
            receiver,
            done: AtomicBool::new(false),
            signal,
        }
    }

    /// New load status with a random (UUID v4) id.
    pub fn load() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), ProcessKind::Load)
    }

    /// New store status with a random (UUID v4) id.
    pub fn store() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string(), ProcessKind::Store)
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> ProcessKind {
        self.kind
    }

    pub fn started_at(&self) -> OffsetDateTime {
        self.started_at
    }

    /// `None` until the run is done.
    pub fn finished_at(&self) -> Option<OffsetDateTime> {
        self.finished.get().map(|(at, _)| *at)
    }

    /// Time between start and finish once done, otherwise time since start.
    pub fn duration(&self) -> Duration {
        match self.finished.get() {
            Some((_, elapsed)) => *elapsed,
            None => self.started.elapsed(),
        }
    }

    pub fn count(&self) -> u64 {
        self.count.load(Ordering::Relaxed)
    }

    /// Total bytes of processed blobs.
    pub fn size(&self) -> u64 {
        self.size.load(Ordering::Relaxed)
    }

    pub fn skip_count(&self) -> u64 {
        self.skip_count.load(Ordering::Relaxed)
    }

    pub fn skip_size(&self) -> u64 {
        self.skip_size.load(Ordering::Relaxed)
    }

    pub fn error_count(&self) -> u64 {
        self.error_count.load(Ordering::Relaxed)
    }

    pub fn add_count(&self, n: u64) {
        self.count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_size(&self, n: u64) {
        self.size.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_skip_count(&self, n: u64) {
        self.skip_count.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_skip_size(&self, n: u64) {
        self.skip_size.fetch_add(n, Ordering::Relaxed);
    }

    pub fn add_error_count(&self, n: u64) {
        self.error_count.fetch_add(n, Ordering::Relaxed);
    }

    /// A handle on the output queue. Every clone competes for the same items;
    /// the queue ends once the run is done and the backlog is drained.
    ///
    /// Producers block until a consumer takes each blob, so somebody has to
    /// drain this for the run to complete.
    pub fn blobs(&self) -> Receiver<Blob> {
        self.receiver.clone()
    }

    /// Push a produced blob into the output queue, waiting for room.
    ///
    /// Returns `false` if the run has already finished and the blob was
    /// dropped.
    pub async fn emit(&self, blob: impl Into<Blob>) -> bool {
        match self.sender.send(blob.into()).await {
            Ok(()) => true,
            Err(_) => {
                tracing::error!(id = %self.id, kind = %self.kind, "Blob emitted after the run finished; dropping it");
                false
            },
        }
    }

    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Resolves once the run is done. Returns immediately if it already is.
    pub async fn wait(&self) {
        let mut rx = self.signal.subscribe();
        // The sender lives as long as `self`, so this can't fail.
        let _ = rx.wait_for(|done| *done).await;
    }

    /// Mark the run as done: record the finish time, close the output queue
    /// and fire the done signal.
    ///
    /// Must only be called once every producer has been joined. Only the first
    /// call does anything; it returns `true`, every later call `false`.
    pub fn finish(&self) -> bool {
        let finished = (OffsetDateTime::now_utc(), self.started.elapsed());
        if self.finished.set(finished).is_err() {
            return false;
        }
        self.done.store(true, Ordering::Release);
        self.sender.close();
        self.signal.send_replace(true);
        true
    }

    /// Point-in-time copy of everything the status knows.
    pub fn snapshot(&self) -> Result<StatusSnapshot> {
        // Read the flag first so a finish racing with this call can't produce
        // `done: true` without a finish time.
        let done = self.is_done();
        let finish = match done {
            true => self.finished_at(),
            false => None,
        };
        Ok(StatusSnapshot {
            id: self.id.clone(),
            kind: self.kind,
            start: self.started_at.format(TIMESTAMP).or_raise(|| ErrorKind::Serialize)?,
            finish: finish.map(|f| f.format(TIMESTAMP)).transpose().or_raise(|| ErrorKind::Serialize)?,
            duration: u64::try_from(self.duration().as_nanos()).unwrap_or(u64::MAX),
            count: self.count(),
            size: self.size(),
            skip_count: self.skip_count(),
            skip_size: self.skip_size(),
            error_count: self.error_count(),
            done,
        })
    }

    /// The status as a JSON object string.
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string(&self.snapshot()?).or_raise(|| ErrorKind::Serialize)
    }
}

/// Serializable view of a [`ProcessStatus`].
///
/// ```json
/// {"id":"…","type":"load","start":"2024-01-01T00:00:00.000000","duration":1200,
///  "count":2,"size":10,"skip-count":1,"skip-size":4,"error-count":0,"done":false}
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ProcessKind,
    pub start: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish: Option<String>,
    /// Nanoseconds.
    pub duration: u64,
    pub count: u64,
    pub size: u64,
    #[serde(rename = "skip-count")]
    pub skip_count: u64,
    #[serde(rename = "skip-size")]
    pub skip_size: u64,
    #[serde(rename = "error-count")]
    pub error_count: u64,
    pub done: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SourceBlob;
    use std::sync::Arc;

    #[test]
    fn test_new_status_is_running() {
        let status = ProcessStatus::load();
        assert_eq!(status.kind(), ProcessKind::Load);
        assert!(!status.is_done());
        assert!(status.finished_at().is_none());
        assert_eq!(status.count(), 0);
        assert!(uuid::Uuid::parse_str(status.id()).is_ok());
    }

    #[test]
    fn test_finish_happens_exactly_once() {
        let status = ProcessStatus::store();
        assert!(status.finish());
        let first = status.finished_at();
        let duration = status.duration();
        assert!(!status.finish());
        assert!(!status.finish());
        assert!(status.is_done());
        assert_eq!(status.finished_at(), first);
        assert_eq!(status.duration(), duration);
    }

    #[test]
    fn test_finish_closes_queue() {
        let status = ProcessStatus::load();
        let blobs = status.blobs();
        assert!(!blobs.is_closed());
        status.finish();
        assert!(blobs.is_closed());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_adds_are_never_lost() {
        let status = Arc::new(ProcessStatus::load());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let status = Arc::clone(&status);
            handles.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    status.add_count(1);
                    status.add_size(3);
                    status.add_error_count(1);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(status.count(), 8000);
        assert_eq!(status.size(), 24000);
        assert_eq!(status.error_count(), 8000);
    }

    #[tokio::test]
    async fn test_wait_is_released_by_finish() {
        let status = Arc::new(ProcessStatus::load());
        let waiter = {
            let status = Arc::clone(&status);
            tokio::spawn(async move {
                status.wait().await;
                status.is_done()
            })
        };
        tokio::task::yield_now().await;
        status.finish();
        assert!(waiter.await.unwrap());
        // Waiting after the fact returns immediately.
        status.wait().await;
    }

    #[tokio::test]
    async fn test_emit_and_drain() {
        let status = Arc::new(ProcessStatus::load());
        let blobs = status.blobs();
        let producer = {
            let status = Arc::clone(&status);
            tokio::spawn(async move {
                for name in ["a", "b", "c"] {
                    let blob = SourceBlob::with_content(format!("/src/{name}"), name.as_bytes().to_vec()).unwrap();
                    assert!(status.emit(blob).await);
                }
                status.finish();
            })
        };
        let mut names = Vec::new();
        while let Ok(blob) = blobs.recv().await {
            names.push(blob.name().to_string());
        }
        producer.await.unwrap();
        names.sort();
        assert_eq!(names, ["a", "b", "c"]);
        assert!(!status.emit(SourceBlob::new("/src/late").unwrap()).await);
    }

    #[test]
    fn test_json_before_and_after_done() {
        let status = ProcessStatus::new("run-1", ProcessKind::Store);
        status.add_count(2);
        status.add_size(10);
        status.add_skip_count(1);
        status.add_skip_size(4);

        let running: serde_json::Value = serde_json::from_str(&status.to_json().unwrap()).unwrap();
        assert_eq!(running["id"], "run-1");
        assert_eq!(running["type"], "store");
        assert_eq!(running["done"], false);
        assert!(running.get("finish").is_none());
        assert_eq!(running["count"], 2);
        assert_eq!(running["size"], 10);
        assert_eq!(running["skip-count"], 1);
        assert_eq!(running["skip-size"], 4);
        assert_eq!(running["error-count"], 0);

        status.finish();
        let done: serde_json::Value = serde_json::from_str(&status.to_json().unwrap()).unwrap();
        assert_eq!(done["done"], true);
        assert!(done["finish"].is_string());
        // Stable once done.
        assert_eq!(status.snapshot().unwrap(), status.snapshot().unwrap());
    }

    #[test]
    fn test_timestamp_format() {
        let status = ProcessStatus::load();
        let snapshot = status.snapshot().unwrap();
        // YYYY-MM-DDTHH:MM:SS.ffffff
        assert_eq!(snapshot.start.len(), 26);
        assert_eq!(&snapshot.start[10..11], "T");
        assert_eq!(&snapshot.start[19..20], ".");
    }
}
