//! Binary attachments (PDFs) stored next to the snapshot, keyed by owner

use std::sync::Arc;

use super::storage::KeyValueStorage;
use crate::error::PersistenceError;

/// Companion blob storage for paper attachments.
///
/// Not part of the snapshot: attachment writes are neither staged nor rolled
/// back with store mutations.
#[derive(Clone)]
pub struct AttachmentStore {
    storage: Arc<dyn KeyValueStorage>,
    namespace: String,
}

impl AttachmentStore {
    pub fn new(storage: Arc<dyn KeyValueStorage>, namespace: impl Into<String>) -> Self {
        Self {
            storage,
            namespace: namespace.into(),
        }
    }

    fn key(&self, owner: &str) -> String {
        format!("{}.attachment.{}", self.namespace, owner)
    }

    pub fn put(&self, owner: &str, bytes: &[u8]) -> Result<(), PersistenceError> {
        self.storage.put(&self.key(owner), bytes)
    }

    pub fn get(&self, owner: &str) -> Result<Option<Vec<u8>>, PersistenceError> {
        self.storage.get(&self.key(owner))
    }

    /// Move the attachment stored under `from` to `to`
    pub fn reassign(&self, from: &str, to: &str) -> Result<(), PersistenceError> {
        self.storage.rename(&self.key(from), &self.key(to))
    }

    pub fn remove(&self, owner: &str) -> Result<(), PersistenceError> {
        self.storage.remove(&self.key(owner))
    }

    /// Owners that currently have an attachment
    pub fn owners(&self) -> Result<Vec<String>, PersistenceError> {
        let prefix = self.key("");
        Ok(self
            .storage
            .keys_with_prefix(&prefix)?
            .into_iter()
            .filter_map(|key| key.strip_prefix(&prefix).map(str::to_string))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::persistence::MemoryStorage;

    #[test]
    fn test_reassign_moves_bytes() {
        let attachments = AttachmentStore::new(Arc::new(MemoryStorage::new()), "scholia");
        attachments.put("upload-1", b"%PDF-1.7").unwrap();
        attachments.reassign("upload-1", "paper-1").unwrap();

        assert!(attachments.get("upload-1").unwrap().is_none());
        assert_eq!(attachments.get("paper-1").unwrap(), Some(b"%PDF-1.7".to_vec()));
        assert_eq!(attachments.owners().unwrap(), vec!["paper-1"]);
    }

    #[test]
    fn test_reassign_missing_fails() {
        let attachments = AttachmentStore::new(Arc::new(MemoryStorage::new()), "scholia");
        assert!(attachments.reassign("nothing", "paper-1").is_err());
    }
}
