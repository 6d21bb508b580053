//! Host key-value storage abstraction

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::error::PersistenceError;

/// The trait that all host storage backends implement.
///
/// Keys are short ASCII strings. `rename` must be atomic: a reader sees either
/// the old value under `to` or the new one, never a mix.
pub trait KeyValueStorage: Send + Sync {
    /// Read the value stored under `key`.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError>;

    /// Write `value` under `key`, replacing anything there.
    fn put(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError>;

    /// Remove `key`. Removing a missing key is not an error.
    fn remove(&self, key: &str) -> Result<(), PersistenceError>;

    /// Move the value under `from` to `to`, replacing `to` atomically.
    fn rename(&self, from: &str, to: &str) -> Result<(), PersistenceError>;

    /// All keys starting with `prefix`, sorted.
    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError>;
}

/// Keys may only use characters safe as file names on every platform
pub(crate) fn check_key(key: &str) -> Result<(), PersistenceError> {
    let valid = !key.is_empty()
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(PersistenceError::Storage(format!("invalid storage key '{}'", key)))
    }
}

#[derive(Debug, Default)]
struct MemoryInner {
    entries: BTreeMap<String, Vec<u8>>,
    writes: u64,
    reject_writes: bool,
}

/// In-memory storage. Clones share the same entries.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryInner>, PersistenceError> {
        self.inner
            .lock()
            .map_err(|_| PersistenceError::Storage("memory storage lock poisoned".to_string()))
    }

    /// Number of successful `put` and `rename` calls so far
    pub fn write_count(&self) -> u64 {
        self.lock().map(|inner| inner.writes).unwrap_or(0)
    }

    /// Simulate a host that refuses writes (quota exceeded, revoked permission)
    pub fn set_reject_writes(&self, reject: bool) {
        if let Ok(mut inner) = self.lock() {
            inner.reject_writes = reject;
        }
    }

    fn check_writable(inner: &MemoryInner) -> Result<(), PersistenceError> {
        if inner.reject_writes {
            return Err(PersistenceError::Storage("storage rejected write".to_string()));
        }
        Ok(())
    }
}

impl KeyValueStorage for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        Ok(self.lock()?.entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        check_key(key)?;
        let mut inner = self.lock()?;
        Self::check_writable(&inner)?;
        inner.entries.insert(key.to_string(), value.to_vec());
        inner.writes += 1;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        self.lock()?.entries.remove(key);
        Ok(())
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), PersistenceError> {
        check_key(to)?;
        let mut inner = self.lock()?;
        Self::check_writable(&inner)?;
        let value = inner
            .entries
            .remove(from)
            .ok_or_else(|| PersistenceError::Storage(format!("no value under '{}'", from)))?;
        inner.entries.insert(to.to_string(), value);
        inner.writes += 1;
        Ok(())
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        Ok(self
            .lock()?
            .entries
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_put_get_rename() {
        let storage = MemoryStorage::new();
        storage.put("ns.v1.tmp", b"hello").unwrap();
        storage.rename("ns.v1.tmp", "ns.v1").unwrap();

        assert_eq!(storage.get("ns.v1").unwrap(), Some(b"hello".to_vec()));
        assert_eq!(storage.get("ns.v1.tmp").unwrap(), None);
        assert_eq!(storage.write_count(), 2);
    }

    #[test]
    fn test_clones_share_entries() {
        let storage = MemoryStorage::new();
        let observer = storage.clone();
        storage.put("a", b"1").unwrap();
        assert_eq!(observer.get("a").unwrap(), Some(b"1".to_vec()));
    }

    #[test]
    fn test_keys_with_prefix_sorted() {
        let storage = MemoryStorage::new();
        storage.put("ns.v2", b"").unwrap();
        storage.put("other", b"").unwrap();
        storage.put("ns.v1", b"").unwrap();
        assert_eq!(storage.keys_with_prefix("ns.").unwrap(), vec!["ns.v1", "ns.v2"]);
    }

    #[test]
    fn test_rejected_writes() {
        let storage = MemoryStorage::new();
        storage.set_reject_writes(true);
        assert!(storage.put("a", b"1").is_err());
        assert_eq!(storage.write_count(), 0);
    }

    #[test]
    fn test_invalid_key() {
        let storage = MemoryStorage::new();
        assert!(storage.put("../escape", b"x").is_err());
        assert!(storage.put("", b"x").is_err());
    }
}
