//! One file per key in a data directory

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use super::storage::{check_key, KeyValueStorage};
use crate::error::PersistenceError;

/// Suffix for half-written files; never reported as a key
const PARTIAL_SUFFIX: &str = ".partial";

/// File-backed storage.
///
/// `put` writes to a sibling `.partial` file, syncs it and renames it into
/// place, so a crash mid-write leaves the previous value intact.
#[derive(Debug, Clone)]
pub struct FileStorage {
    root: PathBuf,
}

impl FileStorage {
    /// Open (or create) storage rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let root = root.into();
        fs::create_dir_all(&root).map_err(|e| {
            PersistenceError::Io(format!("create {}: {}", root.display(), e))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, PersistenceError> {
        check_key(key)?;
        Ok(self.root.join(key))
    }
}

impl KeyValueStorage for FileStorage {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        let path = self.path_for(key)?;
        match fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(PersistenceError::Io(format!("read {}: {}", path.display(), e))),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        let partial = self.root.join(format!("{}{}", key, PARTIAL_SUFFIX));

        let mut file = fs::File::create(&partial)?;
        file.write_all(value)?;
        file.sync_all()?;
        drop(file);

        fs::rename(&partial, &path)
            .map_err(|e| PersistenceError::Io(format!("rename {}: {}", partial.display(), e)))
    }

    fn remove(&self, key: &str) -> Result<(), PersistenceError> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(PersistenceError::Io(format!("remove {}: {}", path.display(), e))),
        }
    }

    fn rename(&self, from: &str, to: &str) -> Result<(), PersistenceError> {
        let source = self.path_for(from)?;
        let target = self.path_for(to)?;
        fs::rename(&source, &target).map_err(|e| {
            PersistenceError::Io(format!("rename {} -> {}: {}", from, to, e))
        })
    }

    fn keys_with_prefix(&self, prefix: &str) -> Result<Vec<String>, PersistenceError> {
        let mut keys = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if name.starts_with(prefix) && !name.ends_with(PARTIAL_SUFFIX) {
                keys.push(name);
            }
        }
        keys.sort();
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_put_get_remove() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage.put("scholia.v4", b"{}").unwrap();
        assert_eq!(storage.get("scholia.v4").unwrap(), Some(b"{}".to_vec()));

        storage.remove("scholia.v4").unwrap();
        assert_eq!(storage.get("scholia.v4").unwrap(), None);
        storage.remove("scholia.v4").unwrap();
    }

    #[test]
    fn test_rename_replaces_target() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();

        storage.put("scholia.v4", b"old").unwrap();
        storage.put("scholia.v4.tmp", b"new").unwrap();
        storage.rename("scholia.v4.tmp", "scholia.v4").unwrap();

        assert_eq!(storage.get("scholia.v4").unwrap(), Some(b"new".to_vec()));
        assert_eq!(storage.keys_with_prefix("scholia.").unwrap(), vec!["scholia.v4"]);
    }

    #[test]
    fn test_partial_files_hidden() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        fs::write(dir.path().join("scholia.v3.partial"), b"half").unwrap();

        assert!(storage.keys_with_prefix("scholia").unwrap().is_empty());
    }

    #[test]
    fn test_rejects_path_traversal() {
        let dir = TempDir::new().unwrap();
        let storage = FileStorage::open(dir.path()).unwrap();
        assert!(storage.get("../etc/passwd").is_err());
    }
}
