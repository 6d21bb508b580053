//! Host storage backends and the snapshot persistence adapter

mod adapter;
mod attachments;
mod file;
#[cfg(feature = "sqlite")]
mod sqlite;
mod storage;

use std::sync::Arc;

pub use adapter::PersistenceAdapter;
pub use attachments::AttachmentStore;
pub use file::FileStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;
pub use storage::{KeyValueStorage, MemoryStorage};

use crate::config::{BackendKind, StoreConfig};
use crate::error::PersistenceError;

/// File name of the SQLite database inside the data directory
pub const SQLITE_FILE_NAME: &str = "scholia.sqlite3";

/// Open the host storage backend a configuration names
pub fn open_storage(config: &StoreConfig) -> Result<Arc<dyn KeyValueStorage>, PersistenceError> {
    match config.backend {
        BackendKind::Memory => Ok(Arc::new(MemoryStorage::new())),
        BackendKind::File => Ok(Arc::new(FileStorage::open(config.resolved_data_dir())?)),
        BackendKind::Sqlite => open_sqlite(config),
    }
}

#[cfg(feature = "sqlite")]
fn open_sqlite(config: &StoreConfig) -> Result<Arc<dyn KeyValueStorage>, PersistenceError> {
    let dir = config.resolved_data_dir();
    std::fs::create_dir_all(&dir)?;
    Ok(Arc::new(SqliteStorage::open(&dir.join(SQLITE_FILE_NAME))?))
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_config: &StoreConfig) -> Result<Arc<dyn KeyValueStorage>, PersistenceError> {
    Err(PersistenceError::Storage(
        "sqlite backend requires the `sqlite` feature".to_string(),
    ))
}

/// Adapter over the configured backend
pub fn adapter_for(config: &StoreConfig) -> Result<PersistenceAdapter, PersistenceError> {
    let storage = open_storage(config)?;
    Ok(PersistenceAdapter::new(storage, config.namespace.clone())
        .with_pretty(config.pretty_json)
        .with_corrupt_backup(config.backup_corrupt_blobs))
}
