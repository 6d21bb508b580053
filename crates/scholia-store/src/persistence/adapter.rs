//! Reads and writes the namespaced snapshot blob

use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{debug, warn};

use super::storage::KeyValueStorage;
use crate::error::PersistenceError;
use crate::snapshot::Snapshot;

/// Persists the whole store state as one JSON blob.
///
/// The blob lives under `<namespace>.v<schemaVersion>`, so a reader can tell
/// which schema wrote it from the key alone. Writes go to
/// `<namespace>.v<n>.tmp` first and are renamed into place.
#[derive(Clone)]
pub struct PersistenceAdapter {
    storage: Arc<dyn KeyValueStorage>,
    namespace: String,
    pretty: bool,
    backup_corrupt: bool,
}

impl std::fmt::Debug for PersistenceAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PersistenceAdapter")
            .field("namespace", &self.namespace)
            .field("pretty", &self.pretty)
            .field("backup_corrupt", &self.backup_corrupt)
            .finish_non_exhaustive()
    }
}

impl PersistenceAdapter {
    pub fn new(storage: Arc<dyn KeyValueStorage>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
            pretty: false,
            backup_corrupt: true,
        }
    }

    /// Indent the written JSON
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    /// Copy malformed blobs aside before reporting them
    pub fn with_corrupt_backup(mut self, backup: bool) -> Self {
        self.backup_corrupt = backup;
        self
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// The underlying host storage, shared with companion stores
    pub fn storage(&self) -> Arc<dyn KeyValueStorage> {
        Arc::clone(&self.storage)
    }

    pub fn blob_key(&self, version: u32) -> String {
        format!("{}.v{}", self.namespace, version)
    }

    pub fn temp_key(&self, version: u32) -> String {
        format!("{}.v{}.tmp", self.namespace, version)
    }

    fn version_of(&self, key: &str) -> Option<u32> {
        let rest = key.strip_prefix(&self.namespace)?.strip_prefix(".v")?;
        if rest.is_empty() || !rest.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        rest.parse().ok()
    }

    /// Schema versions with a blob present, ascending
    pub fn stored_versions(&self) -> Result<Vec<u32>, PersistenceError> {
        let prefix = format!("{}.v", self.namespace);
        let mut versions: Vec<u32> = self
            .storage
            .keys_with_prefix(&prefix)?
            .iter()
            .filter_map(|key| self.version_of(key))
            .collect();
        versions.sort_unstable();
        versions.dedup();
        Ok(versions)
    }

    /// Highest schema version with a blob present
    pub fn stored_version(&self) -> Result<Option<u32>, PersistenceError> {
        Ok(self.stored_versions()?.last().copied())
    }

    /// Read the newest blob as raw JSON, before any migration.
    ///
    /// A blob under the bare namespace key predates versioned keys and is
    /// read when no versioned key exists. Returns `Ok(None)` when nothing has
    /// been stored yet.
    pub fn load_raw(&self) -> Result<Option<Value>, PersistenceError> {
        let key = match self.stored_version()? {
            Some(version) => self.blob_key(version),
            None => self.namespace.clone(),
        };
        let Some(bytes) = self.storage.get(&key)? else {
            return Ok(None);
        };

        let reason = match serde_json::from_slice::<Value>(&bytes) {
            Ok(value) if value.is_object() => return Ok(Some(value)),
            Ok(_) => "top-level value is not an object".to_string(),
            Err(e) => e.to_string(),
        };

        if self.backup_corrupt {
            self.backup(&key, &bytes);
        }
        Err(PersistenceError::Malformed { key, reason })
    }

    /// Load a blob already at the current schema. Absent means empty.
    pub fn load(&self) -> Result<Snapshot, PersistenceError> {
        match self.load_raw()? {
            Some(value) => Snapshot::from_value(value),
            None => Ok(Snapshot::empty()),
        }
    }

    /// Persist `snapshot` under its schema version. Returns bytes written.
    pub fn save(&self, snapshot: &Snapshot) -> Result<usize, PersistenceError> {
        let bytes = self.encode(snapshot)?;
        self.write_blob(&bytes, snapshot.schema_version)
    }

    /// Persist an arbitrary raw state recorded at `version`
    pub fn save_raw(&self, value: &Value, version: u32) -> Result<usize, PersistenceError> {
        let bytes = self.encode(value)?;
        self.write_blob(&bytes, version)
    }

    fn encode<T: serde::Serialize>(&self, value: &T) -> Result<Vec<u8>, PersistenceError> {
        let bytes = if self.pretty {
            serde_json::to_vec_pretty(value)?
        } else {
            serde_json::to_vec(value)?
        };
        Ok(bytes)
    }

    fn write_blob(&self, bytes: &[u8], version: u32) -> Result<usize, PersistenceError> {
        let key = self.blob_key(version);
        let temp = self.temp_key(version);

        self.storage.put(&temp, bytes)?;
        self.storage.rename(&temp, &key)?;
        debug!(key = %key, bytes = bytes.len(), "Saved snapshot");

        self.remove_stale(version);
        Ok(bytes.len())
    }

    /// Drop blobs written under older schema keys. Failures only cost space.
    fn remove_stale(&self, current: u32) {
        let stale = match self.stored_versions() {
            Ok(versions) => versions,
            Err(e) => {
                warn!(error = %e, "Could not list stored blobs");
                return;
            }
        };
        let keys = stale
            .into_iter()
            .filter(|v| *v < current)
            .map(|v| self.blob_key(v))
            .chain(std::iter::once(self.namespace.clone()));
        for key in keys {
            if let Err(e) = self.storage.remove(&key) {
                warn!(key = %key, error = %e, "Could not remove stale blob");
            }
        }
    }

    /// Copy a readable but unusable state aside, if backups are enabled
    pub fn quarantine(&self, value: &Value) {
        if !self.backup_corrupt {
            return;
        }
        match serde_json::to_vec(value) {
            Ok(bytes) => self.backup(&self.namespace, &bytes),
            Err(e) => warn!(error = %e, "Could not encode state for backup"),
        }
    }

    fn backup(&self, key: &str, bytes: &[u8]) {
        let backup_key = format!("{}.corrupt.{}", self.namespace, Utc::now().timestamp_millis());
        match self.storage.put(&backup_key, bytes) {
            Ok(()) => warn!(key = %key, backup = %backup_key, "Backed up unreadable blob"),
            Err(e) => warn!(key = %key, error = %e, "Could not back up unreadable blob"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;
    use crate::snapshot::CURRENT_SCHEMA_VERSION;

    fn adapter() -> (MemoryStorage, PersistenceAdapter) {
        let storage = MemoryStorage::new();
        let adapter = PersistenceAdapter::new(Arc::new(storage.clone()), "scholia");
        (storage, adapter)
    }

    #[test]
    fn test_absent_blob_loads_empty() {
        let (_, adapter) = adapter();
        assert_eq!(adapter.load_raw().unwrap(), None);
        assert!(adapter.load().unwrap().is_empty());
    }

    #[test]
    fn test_key_embeds_version() {
        let (storage, adapter) = adapter();
        adapter.save(&Snapshot::empty()).unwrap();

        let key = format!("scholia.v{}", CURRENT_SCHEMA_VERSION);
        assert!(storage.get(&key).unwrap().is_some());
        assert_eq!(adapter.stored_version().unwrap(), Some(CURRENT_SCHEMA_VERSION));
        assert!(storage.get(&format!("{}.tmp", key)).unwrap().is_none());
    }

    #[test]
    fn test_older_blobs_removed_after_save() {
        let (storage, adapter) = adapter();
        storage.put("scholia.v2", b"{\"schemaVersion\":2}").unwrap();
        storage.put("scholia", b"{}").unwrap();

        adapter.save(&Snapshot::empty()).unwrap();

        assert_eq!(adapter.stored_versions().unwrap(), vec![CURRENT_SCHEMA_VERSION]);
        assert!(storage.get("scholia").unwrap().is_none());
    }

    #[test]
    fn test_malformed_blob_backed_up() {
        let (storage, adapter) = adapter();
        storage.put("scholia.v4", b"{not json").unwrap();

        let err = adapter.load_raw().unwrap_err();
        assert!(matches!(err, PersistenceError::Malformed { .. }));

        let backups = storage.keys_with_prefix("scholia.corrupt.").unwrap();
        assert_eq!(backups.len(), 1);
        assert_eq!(storage.get(&backups[0]).unwrap(), Some(b"{not json".to_vec()));
    }

    #[test]
    fn test_non_object_is_malformed() {
        let (_, adapter) = adapter();
        adapter.save_raw(&serde_json::json!([1, 2, 3]), 4).unwrap();
        assert!(adapter.load_raw().is_err());
    }

    #[test]
    fn test_legacy_unversioned_key_read() {
        let (storage, adapter) = adapter();
        storage.put("scholia", b"{\"theses\":[]}").unwrap();
        let raw = adapter.load_raw().unwrap().unwrap();
        assert!(raw.get("theses").is_some());
    }

    #[test]
    fn test_version_parse_ignores_other_keys() {
        let (_, adapter) = adapter();
        assert_eq!(adapter.version_of("scholia.v12"), Some(12));
        assert_eq!(adapter.version_of("scholia.v4.tmp"), None);
        assert_eq!(adapter.version_of("scholia.attachment.x"), None);
        assert_eq!(adapter.version_of("other.v4"), None);
    }
}
