use hoard_blob::{Blob, Fingerprint, SourceBlob, StatusHandle, StoredBlob};
use hoard_storage::{FileSystem, Skip, StoredRecord, shard_path};
use std::collections::HashSet;
use std::fs::{create_dir_all, write};
use std::path::Path;

async fn drain(status: &StatusHandle) -> Vec<Blob> {
    let blobs = status.blobs();
    let mut out = Vec::new();
    while let Ok(blob) = blobs.recv().await {
        out.push(blob);
    }
    status.wait().await;
    out
}

async fn load_and_store(fs: &FileSystem, source: &Path) -> (StatusHandle, StatusHandle, Vec<Blob>) {
    let loaded = fs.load(source);
    let stored = fs.store(loaded.blobs());
    let output = drain(&stored).await;
    loaded.wait().await;
    (loaded, stored, output)
}

fn stored_pairs(root: &Path) -> Vec<std::path::PathBuf> {
    let mut pairs = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in std::fs::read_dir(&dir).unwrap() {
            let path = entry.unwrap().path();
            if path.is_dir() {
                stack.push(path);
            } else if path.file_name().is_some_and(|n| n == "blob") {
                assert!(path.with_file_name("meta").is_file());
                pairs.push(path.parent().unwrap().to_path_buf());
            }
        }
    }
    pairs
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_end_to_end_load_then_store() {
    let source = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    write(source.path().join("a.txt"), b"hello").unwrap();
    write(source.path().join(".hidden"), b"secret").unwrap();
    write(source.path().join("b.txt"), b"hello").unwrap();

    let fs = FileSystem::new(store.path(), 4, 4).unwrap();
    let (loaded, stored, output) = load_and_store(&fs, source.path()).await;

    assert!(loaded.is_done());
    assert_eq!(loaded.count(), 2);
    assert_eq!(loaded.size(), 10);
    assert_eq!(loaded.skip_count(), 1);
    assert_eq!(loaded.skip_size(), 6);
    assert_eq!(loaded.error_count(), 0);

    assert!(stored.is_done());
    assert_eq!(stored.count(), 1);
    assert_eq!(stored.size(), 5);
    assert_eq!(stored.skip_count(), 1);
    assert_eq!(stored.skip_size(), 5);
    assert_eq!(stored.error_count(), 0);

    let hello = Fingerprint::compute(b"hello");
    let expected = shard_path(fs.root(), &hello);
    assert_eq!(stored_pairs(store.path()), vec![expected.clone()]);
    assert_eq!(std::fs::read(expected.join("blob")).unwrap(), b"hello");

    let record = StoredRecord::read(&expected).await.unwrap();
    assert_eq!(record.content_hash, hello);
    assert_eq!(record.size, 5);
    assert!(matches!(record.filename.as_deref(), Some("a.txt" | "b.txt")));

    assert_eq!(output.len(), 1);
    let relocated = output[0].as_stored().unwrap();
    assert_eq!(relocated.directory(), expected);
    assert_eq!(relocated.fingerprint(), &hello);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_second_store_is_all_duplicates() {
    let source = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    create_dir_all(source.path().join("nested/deeper")).unwrap();
    for (i, name) in ["one", "two", "nested/three", "nested/deeper/four", "nested/deeper/five"].iter().enumerate() {
        write(source.path().join(name), format!("content {i}")).unwrap();
    }

    let fs = FileSystem::new(store.path(), 3, 5).unwrap();
    let (_, first, _) = load_and_store(&fs, source.path()).await;
    assert_eq!(first.count(), 5);
    assert_eq!(first.error_count(), 0);

    let (_, second, output) = load_and_store(&fs, source.path()).await;
    assert_eq!(second.count(), 0);
    assert_eq!(second.skip_count(), 5);
    assert_eq!(second.error_count(), 0);
    assert!(output.is_empty());
    assert_eq!(stored_pairs(store.path()).len(), 5);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_load_counts_hidden_and_visible() {
    let source = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    create_dir_all(source.path().join("dir")).unwrap();
    for name in ["a", "b", "dir/c", ".x", "dir/.y", ".z"] {
        write(source.path().join(name), name.as_bytes()).unwrap();
    }

    let fs = FileSystem::new(store.path(), 1, 2).unwrap();
    let loaded = fs.load(source.path());
    let names: HashSet<String> = drain(&loaded).await.iter().map(|b| b.name().to_string()).collect();

    assert_eq!(loaded.count(), 3);
    assert_eq!(loaded.skip_count(), 3);
    assert_eq!(names, HashSet::from(["a".into(), "b".into(), "c".into()]));
}

#[tokio::test]
async fn test_custom_skip_replaces_default() {
    let source = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    write(source.path().join(".kept"), b"1").unwrap();
    write(source.path().join("Thumbs.db"), b"22").unwrap();

    let fs = FileSystem::new(store.path(), 1, 1).unwrap().with_skip(Skip::names(["thumbs.db"]));
    let loaded = fs.load(source.path());
    let blobs = drain(&loaded).await;

    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].name(), ".kept");
    assert_eq!(loaded.skip_count(), 1);
    assert_eq!(loaded.skip_size(), 2);
}

#[tokio::test]
async fn test_status_json_after_completion() {
    let source = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    write(source.path().join("file"), b"abc").unwrap();

    let fs = FileSystem::new(store.path(), 1, 1).unwrap();
    let loaded = fs.load(source.path());
    drain(&loaded).await;

    let first: serde_json::Value = serde_json::from_str(&loaded.to_json().unwrap()).unwrap();
    let second: serde_json::Value = serde_json::from_str(&loaded.to_json().unwrap()).unwrap();
    assert_eq!(first["done"], true);
    assert_eq!(first["type"], "load");
    assert_eq!(first["count"], 1);
    assert!(first.get("finish").is_some());
    assert_eq!(first, second);
    assert!(!loaded.finish());
}

#[tokio::test]
async fn test_duplicate_after_failed_write_is_stored() {
    let store = tempfile::tempdir().unwrap();
    let gone = tempfile::tempdir().unwrap();
    let hello = Fingerprint::compute(b"hello");
    // A stored blob whose `blob` file is missing cannot be moved.
    let missing = StoredBlob::new(gone.path().join("nowhere"), "a.txt", 5, hello.clone()).unwrap();
    let source = SourceBlob::with_content("/src/b.txt", b"hello".to_vec()).unwrap();

    let fs = FileSystem::new(store.path(), 1, 1).unwrap();
    let (tx, rx) = async_channel::unbounded();
    tx.send(Blob::from(missing)).await.unwrap();
    tx.send(Blob::from(source)).await.unwrap();
    drop(tx);
    let stored = fs.store(rx);
    let output = drain(&stored).await;

    assert_eq!(stored.error_count(), 1);
    assert_eq!(stored.count(), 1);
    assert_eq!(stored.skip_count(), 0);
    assert_eq!(output.len(), 1);
    let target = shard_path(fs.root(), &hello);
    assert_eq!(std::fs::read(target.join("blob")).unwrap(), b"hello");
}

#[tokio::test]
async fn test_failed_blob_write_is_counted_as_error() {
    let source = tempfile::tempdir().unwrap();
    let store = tempfile::tempdir().unwrap();
    write(source.path().join("a.txt"), b"hello").unwrap();

    let fs = FileSystem::new(store.path(), 1, 1).unwrap();
    let target = shard_path(fs.root(), &Fingerprint::compute(b"hello"));
    create_dir_all(target.join("blob")).unwrap();

    let (loaded, stored, output) = load_and_store(&fs, source.path()).await;
    assert_eq!(loaded.count(), 1);
    assert_eq!(stored.error_count(), 1);
    assert_eq!(stored.count(), 0);
    assert_eq!(stored.size(), 0);
    assert_eq!(stored.skip_count(), 0);
    assert_eq!(stored.skip_size(), 0);
    assert!(output.is_empty());
    assert!(target.join("meta").is_file());
    assert!(!target.join("blob").is_file());
}
