use super::*;
use tempfile::TempDir;

fn create_test_store() -> (SnapshotStore, TempDir) {
    let dir = TempDir::new().expect("Failed to create temp dir");
    let store = SnapshotStore::new(dir.path().join("nested").join("index.rkyv"));
    (store, dir)
}

fn create_test_snapshot(items: usize) -> IndexSnapshot {
    IndexSnapshot {
        format_version: SNAPSHOT_FORMAT_VERSION,
        generation: 3,
        dimension: 2,
        variant: StoredVariant::flat(),
        centroids: vec![],
        codebooks: vec![],
        items: (0..items)
            .map(|i| StoredItem {
                item_id: format!("sku-{i}"),
                partition: 0,
                vector: vec![1.0, 0.0],
                codes: vec![],
                metadata: StoredMetadata {
                    brand: Some("Acme".to_string()),
                    ..Default::default()
                },
            })
            .collect(),
        saved_at: 1_760_000_000,
    }
}

#[test]
fn test_save_and_load() {
    let (store, _dir) = create_test_store();
    let snapshot = create_test_snapshot(4);

    let written = store.save(&snapshot).expect("Failed to save snapshot");
    assert!(written > 0);
    assert!(store.exists());

    let loaded = store.load().expect("Failed to load snapshot");
    assert_eq!(loaded, snapshot);
}

#[test]
fn test_inspect_reads_header() {
    let (store, _dir) = create_test_store();
    let written = store
        .save(&create_test_snapshot(5))
        .expect("Failed to save snapshot");

    let header = store.inspect().expect("Failed to inspect snapshot");
    assert_eq!(header.generation, 3);
    assert_eq!(header.dimension, 2);
    assert_eq!(header.items, 5);
    assert_eq!(header.bytes, written);
}

#[test]
fn test_save_replaces_previous_snapshot() {
    let (store, _dir) = create_test_store();
    store
        .save(&create_test_snapshot(2))
        .expect("Failed to save first snapshot");
    store
        .save(&create_test_snapshot(7))
        .expect("Failed to save second snapshot");

    assert_eq!(store.load().expect("should load").items.len(), 7);
    let temp = store.path().with_extension("rkyv.tmp");
    assert!(!temp.exists());
}

#[test]
fn test_load_missing() {
    let (store, _dir) = create_test_store();
    let err = store.load().unwrap_err();
    assert!(matches!(err, StorageError::NotFound { .. }));
}

#[test]
fn test_load_empty_file() {
    let (store, _dir) = create_test_store();
    std::fs::create_dir_all(store.path().parent().expect("has parent")).expect("mkdir");
    std::fs::write(store.path(), b"").expect("write empty");

    let err = store.load().unwrap_err();
    assert!(matches!(err, StorageError::EmptyFile { .. }));
}

#[test]
fn test_load_garbage_rejected() {
    let (store, _dir) = create_test_store();
    std::fs::create_dir_all(store.path().parent().expect("has parent")).expect("mkdir");
    std::fs::write(store.path(), b"definitely not an archive").expect("write garbage");

    let err = store.load().unwrap_err();
    assert!(matches!(err, StorageError::Serialization(_)));
}
