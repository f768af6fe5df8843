//! Storage backend abstraction for `NodePress`.
//!
//! This crate defines the [`StorageBackend`] trait, a plain key-value
//! interface that knows nothing about menus, posts, or users. The document
//! store in `nodepress-core` layers typed JSON collections on top of it.
//!
//! Three implementations are provided:
//!
//! - [`RedbBackend`]: pure-Rust default, backed by redb (feature `redb-backend`)
//! - [`RocksDbBackend`]: backed by `RocksDB` (feature `rocksdb-backend`)
//! - [`MemoryBackend`]: in-memory, for development and tests

mod error;
mod memory;
#[cfg(feature = "redb-backend")]
mod redb_backend;
#[cfg(feature = "rocksdb-backend")]
mod rocksdb_backend;

pub use error::StorageError;
pub use memory::MemoryBackend;
#[cfg(feature = "redb-backend")]
pub use redb_backend::RedbBackend;
#[cfg(feature = "rocksdb-backend")]
pub use rocksdb_backend::RocksDbBackend;

/// A pluggable key-value storage backend.
///
/// Keys are UTF-8 strings using `/` as a separator, with the first segment
/// naming the collection (e.g. `menu/<id>`, `settings/site`). Values are
/// opaque byte arrays.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
/// Each call is its own unit of work; the trait offers no multi-key
/// transactions.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a key-value pair, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Deleting a non-existent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the underlying backend fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List all keys that start with the given prefix, in key order.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] if the underlying backend fails.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Return every key-value pair whose key starts with `prefix`, in key
    /// order.
    ///
    /// The default implementation lists the keys and reads them one by one;
    /// keys removed between the two steps are skipped. Backends should
    /// override this with a single range read.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] or [`StorageError::Read`] if the
    /// underlying backend fails.
    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let keys = self.list(prefix).await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(&key).await? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    /// Check whether a key exists in storage.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
}
