//! Persistence integration tests
//!
//! Reopening a store over each real host backend, and falling back cleanly
//! when the stored blob cannot be read.

mod common;

use std::sync::Arc;

use common::{open_store, seed};
use scholia_domain::{NewPaper, NewThesis};
use scholia_store::{
    BackendKind, EntityStore, FileStorage, KeyValueStorage, MemoryStorage, PersistenceAdapter,
    StoreConfig, StoreError, CURRENT_SCHEMA_VERSION,
};
use tempfile::TempDir;

fn file_config(dir: &TempDir) -> StoreConfig {
    StoreConfig {
        data_dir: Some(dir.path().to_path_buf()),
        backend: BackendKind::File,
        ..StoreConfig::default()
    }
}

#[test]
fn test_file_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = file_config(&dir);

    let thesis = {
        let mut store = EntityStore::open(&config).unwrap();
        let seeded = seed(&mut store);
        seeded.thesis.id
    };

    let store = EntityStore::open(&config).unwrap();
    assert_eq!(store.papers_for_thesis(&thesis).len(), 2);
    assert_eq!(store.list_connections(Some(&thesis)).len(), 1);
    assert!(store.migration_report().migrations_applied.is_empty());

    let blob = dir.path().join(format!("scholia.v{}", CURRENT_SCHEMA_VERSION));
    assert!(blob.exists());
    assert!(!dir.path().join(format!("scholia.v{}.tmp", CURRENT_SCHEMA_VERSION)).exists());
}

#[test]
fn test_file_store_from_toml_config() {
    let dir = TempDir::new().unwrap();
    let text = format!(
        "namespace = \"review\"\nbackend = \"file\"\npretty_json = true\ndata_dir = {:?}\n",
        dir.path().display().to_string()
    );
    let config = StoreConfig::from_toml(&text).unwrap();

    let mut store = EntityStore::open(&config).unwrap();
    store.create_thesis(NewThesis::new("T1")).unwrap();

    let written = std::fs::read_to_string(dir.path().join("review.v4")).unwrap();
    assert!(written.contains("\n  "));
    assert!(written.contains("\"schemaVersion\": 4"));
}

#[test]
fn test_invalid_namespace_refused() {
    let config = StoreConfig {
        namespace: "has.dot".to_string(),
        backend: BackendKind::Memory,
        ..StoreConfig::default()
    };
    assert!(matches!(EntityStore::open(&config), Err(StoreError::Config(_))));
}

#[cfg(feature = "sqlite")]
#[test]
fn test_sqlite_store_survives_reopen() {
    let dir = TempDir::new().unwrap();
    let config = StoreConfig {
        data_dir: Some(dir.path().to_path_buf()),
        backend: BackendKind::Sqlite,
        ..StoreConfig::default()
    };

    let thesis = {
        let mut store = EntityStore::open(&config).unwrap();
        let thesis = store.create_thesis(NewThesis::new("T1")).unwrap();
        store.add_paper(NewPaper::new(thesis.id.clone(), "P1")).unwrap();
        thesis.id
    };

    let store = EntityStore::open(&config).unwrap();
    assert_eq!(store.papers_for_thesis(&thesis).len(), 1);
    assert!(dir.path().join(scholia_store::persistence::SQLITE_FILE_NAME).exists());
}

#[test]
fn test_corrupt_blob_falls_back_to_empty_store() {
    let storage = MemoryStorage::new();
    storage.put("scholia.v4", b"{\"theses\": [").unwrap();

    let mut store = open_store(&storage);

    assert!(store.snapshot().is_empty());
    assert!(store.load_error().unwrap().contains("scholia.v4"));
    assert!(!store.is_read_only());
    let backups = storage.keys_with_prefix("scholia.corrupt.").unwrap();
    assert_eq!(backups.len(), 1);
    assert_eq!(
        storage.get(&backups[0]).unwrap(),
        Some(b"{\"theses\": [".to_vec())
    );

    // The next write replaces the unreadable blob
    store.create_thesis(NewThesis::new("T1")).unwrap();
    assert_eq!(open_store(&storage).list_theses().len(), 1);
}

#[test]
fn test_non_object_blob_is_malformed() {
    let storage = MemoryStorage::new();
    storage.put("scholia.v4", b"[1, 2, 3]").unwrap();

    let store = open_store(&storage);

    assert!(store.snapshot().is_empty());
    assert!(store.load_error().is_some());
}

#[test]
fn test_rejected_write_is_reported_and_not_applied() {
    let storage = MemoryStorage::new();
    let mut store = open_store(&storage);
    let seeded = seed(&mut store);

    storage.set_reject_writes(true);
    let err = store.delete_thesis(&seeded.thesis.id).unwrap_err();
    assert!(matches!(err, StoreError::Persistence(_)));
    assert_eq!(store.list_papers(None).len(), 2);

    storage.set_reject_writes(false);
    assert_eq!(open_store(&storage).list_papers(None).len(), 2);
}

#[test]
fn test_adapter_over_file_storage() {
    let dir = TempDir::new().unwrap();
    let storage = Arc::new(FileStorage::open(dir.path()).unwrap());
    let adapter = PersistenceAdapter::new(storage.clone(), "scholia");

    let mut store = EntityStore::in_memory();
    seed(&mut store);
    adapter.save(store.snapshot()).unwrap();

    assert_eq!(adapter.stored_version().unwrap(), Some(CURRENT_SCHEMA_VERSION));
    assert_eq!(adapter.load().unwrap(), *store.snapshot());
}
