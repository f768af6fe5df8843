//! In-memory storage backend.
//!
//! Keeps every collection in one `BTreeMap` behind a `RwLock`. Nothing is
//! persisted; the server uses it when `NODEPRESS_STORAGE=memory` and the
//! core test suites use it everywhere.

use std::collections::BTreeMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use crate::{StorageBackend, StorageError};

/// An in-memory storage backend backed by a `BTreeMap`.
///
/// Clones share the same map, so a store and a test can both hold one.
///
/// # Examples
///
/// ```
/// # use nodepress_storage::{MemoryBackend, StorageBackend};
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// backend.put("menu/1", b"{}").await.unwrap();
/// let entries = backend.scan("menu/").await.unwrap();
/// assert_eq!(entries.len(), 1);
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of keys currently stored, across all collections.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the backend holds no keys at all.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().await;
        let keys = data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        Ok(keys)
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let data = self.data.read().await;
        let entries = data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(entries)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let data = self.data.read().await;
        Ok(data.contains_key(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_returns_none() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("menu/missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites_existing() {
        let backend = MemoryBackend::new();
        backend.put("posts/a", b"v1").await.unwrap();
        backend.put("posts/a", b"v2").await.unwrap();
        assert_eq!(backend.get("posts/a").await.unwrap(), Some(b"v2".to_vec()));
    }

    #[tokio::test]
    async fn delete_missing_is_noop() {
        let backend = MemoryBackend::new();
        backend.delete("menu/nope").await.unwrap();
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn scan_stays_inside_collection() {
        let backend = MemoryBackend::new();
        backend.put("menu/a", b"1").await.unwrap();
        backend.put("menu/b", b"2").await.unwrap();
        backend.put("menus/c", b"3").await.unwrap();
        backend.put("posts/a", b"4").await.unwrap();

        let entries = backend.scan("menu/").await.unwrap();
        assert_eq!(
            entries,
            vec![
                ("menu/a".to_owned(), b"1".to_vec()),
                ("menu/b".to_owned(), b"2".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn list_empty_prefix_returns_all() {
        let backend = MemoryBackend::new();
        backend.put("a", b"1").await.unwrap();
        backend.put("b", b"2").await.unwrap();
        assert_eq!(backend.list("").await.unwrap(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn exists_tracks_puts_and_deletes() {
        let backend = MemoryBackend::new();
        assert!(!backend.exists("users/x").await.unwrap());
        backend.put("users/x", b"{}").await.unwrap();
        assert!(backend.exists("users/x").await.unwrap());
        backend.delete("users/x").await.unwrap();
        assert!(!backend.exists("users/x").await.unwrap());
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend.put("settings/site", b"{}").await.unwrap();
        assert_eq!(clone.len().await, 1);
    }
}
