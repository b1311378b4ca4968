use async_trait::async_trait;
use hoard_blob::Fingerprint;
use hoard_classify::Classifier;
use hoard_classify::Detector;
use hoard_classify::error::Result as ClassifyResult;
use hoard_index::{Database, Repository};
use hoard_library::index;
use hoard_storage::FileSystem;
use std::path::Path;
use std::sync::Arc;

/// Calls everything plain ASCII text.
struct Plain;

fn listed(listing: &Path) -> Vec<String> {
    std::fs::read_to_string(listing).unwrap().lines().map(str::to_string).collect()
}

#[async_trait]
impl Detector for Plain {
    async fn mime(&self, listing: &Path) -> ClassifyResult<String> {
        Ok(listed(listing).iter().map(|path| format!("{path}: text/plain; charset=us-ascii\n")).collect())
    }

    async fn describe(&self, listing: &Path) -> ClassifyResult<String> {
        Ok(listed(listing).iter().map(|path| format!("{path}: ASCII text\n")).collect())
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_index_records_every_visible_file() {
    let source = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    std::fs::create_dir(source.path().join("sub")).unwrap();
    std::fs::write(source.path().join("a.txt"), b"hello").unwrap();
    std::fs::write(source.path().join("b.txt"), b"hello").unwrap();
    std::fs::write(source.path().join("sub/c.md"), b"world!").unwrap();
    std::fs::write(source.path().join(".hidden"), b"secret").unwrap();

    let fs = FileSystem::new(store.path(), 2, 2).unwrap();
    let classifier = Classifier::new(Arc::new(Plain)).with_batch_size(2).unwrap();
    let db = Database::connect_in_memory().await.unwrap();

    let report = index(&fs, &classifier, &db, 2, source.path()).await.unwrap();

    assert_eq!(report.load.count, 3);
    assert_eq!(report.load.skip_count, 1);
    assert!(report.load.done);
    assert_eq!(report.classified, 3);
    assert_eq!(report.failed, 0);
    assert_eq!(report.inserted, 3);

    let repo = Repository::from(&db);
    assert_eq!(repo.count().await.unwrap(), 3);
    let a = repo.get_by_path(source.path().join("a.txt")).await.unwrap().unwrap();
    let b = repo.get_by_path(source.path().join("b.txt")).await.unwrap().unwrap();
    let c = repo.get_by_path(source.path().join("sub/c.md")).await.unwrap().unwrap();
    assert_eq!(a.content_hash, Fingerprint::compute(b"hello").hex());
    assert_eq!(a.content_hash, b.content_hash);
    assert_eq!(c.content_hash, Fingerprint::compute(b"world!").hex());
    assert_eq!(a.size, 5);
    assert_eq!(a.mime_type, "text/plain");
    assert!(a.mod_time.is_some());
    assert!(!a.linked);

    // Paths already indexed are left alone.
    let again = index(&fs, &classifier, &db, 2, source.path()).await.unwrap();
    assert_eq!(again.classified, 3);
    assert_eq!(again.inserted, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_index_of_missing_source_is_empty() {
    let source = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    let fs = FileSystem::new(store.path(), 1, 1).unwrap();
    let classifier = Classifier::new(Arc::new(Plain));
    let db = Database::connect_in_memory().await.unwrap();

    let report = index(&fs, &classifier, &db, 10, source.path().join("absent")).await.unwrap();

    assert_eq!(report.load.count, 0);
    assert_eq!(report.load.error_count, 1);
    assert_eq!(report.inserted, 0);
}
