//! `RocksDB` storage backend.
//!
//! Wraps the `rocksdb` crate behind the [`StorageBackend`] trait. All calls
//! are dispatched to a blocking thread via [`tokio::task::spawn_blocking`]
//! since `RocksDB` is a synchronous C++ library.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rocksdb::{DBWithThreadMode, Direction, IteratorMode, MultiThreaded, Options};

use crate::{StorageBackend, StorageError};

type Db = DBWithThreadMode<MultiThreaded>;

/// A storage backend backed by `RocksDB`.
///
/// # Examples
///
/// ```no_run
/// # use nodepress_storage::RocksDbBackend;
/// let backend = RocksDbBackend::open("/var/lib/nodepress/rocks").unwrap();
/// ```
#[derive(Clone)]
pub struct RocksDbBackend {
    db: Arc<Db>,
    path: PathBuf,
}

impl std::fmt::Debug for RocksDbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksDbBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// The storage call a blocking task was running.
#[derive(Debug, Clone, Copy)]
enum Op {
    Read,
    Write,
    Delete,
    List,
}

/// Map a blocking task that never completed onto the error of the call it
/// was running.
fn join_failed(op: Op, key: &str, e: &tokio::task::JoinError) -> StorageError {
    let key = key.to_owned();
    let reason = format!("blocking task failed: {e}");
    match op {
        Op::Read => StorageError::Read { key, reason },
        Op::Write => StorageError::Write { key, reason },
        Op::Delete => StorageError::Delete { key, reason },
        Op::List => StorageError::List { prefix: key, reason },
    }
}

impl RocksDbBackend {
    /// Open a `RocksDB` database at the given path, creating it if missing.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if `RocksDB` fails to open or create the
    /// database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let mut opts = Options::default();
        opts.create_if_missing(true);

        let db = Db::open(&opts, path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(Self {
            db: Arc::new(db),
            path: path.to_path_buf(),
        })
    }

    /// Return the filesystem path of this database.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn scan_blocking(db: &Db, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let iter = db.iterator(IteratorMode::From(prefix.as_bytes(), Direction::Forward));

        let mut entries = Vec::new();
        for item in iter {
            let (k, v) = item.map_err(|e| StorageError::List {
                prefix: prefix.to_owned(),
                reason: e.to_string(),
            })?;
            let key = String::from_utf8(k.to_vec()).map_err(|e| StorageError::InvalidKey {
                reason: e.to_string(),
            })?;
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key, v.to_vec()));
        }
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl StorageBackend for RocksDbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let db = Arc::clone(&self.db);
        let owned = key.to_owned();
        tokio::task::spawn_blocking(move || {
            db.get(owned.as_bytes()).map_err(|e| StorageError::Read {
                key: owned,
                reason: e.to_string(),
            })
        })
        .await
        .map_err(|e| join_failed(Op::Read, key, &e))?
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let owned = key.to_owned();
        let value = value.to_vec();
        tokio::task::spawn_blocking(move || {
            db.put(owned.as_bytes(), &value)
                .map_err(|e| StorageError::Write {
                    key: owned,
                    reason: e.to_string(),
                })
        })
        .await
        .map_err(|e| join_failed(Op::Write, key, &e))?
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let owned = key.to_owned();
        tokio::task::spawn_blocking(move || {
            db.delete(owned.as_bytes()).map_err(|e| StorageError::Delete {
                key: owned,
                reason: e.to_string(),
            })
        })
        .await
        .map_err(|e| join_failed(Op::Delete, key, &e))?
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.scan(prefix).await?;
        Ok(entries.into_iter().map(|(k, _)| k).collect())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let db = Arc::clone(&self.db);
        let owned = prefix.to_owned();
        tokio::task::spawn_blocking(move || Self::scan_blocking(&db, &owned))
            .await
            .map_err(|e| join_failed(Op::List, prefix, &e))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn put_get_delete_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let backend = RocksDbBackend::open(dir.path()).unwrap();

        backend.put("menu/a", b"1").await.unwrap();
        backend.put("posts/b", b"2").await.unwrap();
        assert_eq!(backend.get("menu/a").await.unwrap(), Some(b"1".to_vec()));
        assert_eq!(backend.list("menu/").await.unwrap(), vec!["menu/a".to_owned()]);

        backend.delete("menu/a").await.unwrap();
        assert_eq!(backend.get("menu/a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn failed_task_reports_the_interrupted_call() {
        let handle = tokio::spawn(std::future::pending::<()>());
        handle.abort();
        let err = handle.await.unwrap_err();

        assert!(matches!(
            join_failed(Op::Write, "posts/x", &err),
            StorageError::Write { ref key, .. } if key == "posts/x"
        ));
        assert!(matches!(
            join_failed(Op::Delete, "posts/x", &err),
            StorageError::Delete { .. }
        ));
        assert!(matches!(
            join_failed(Op::List, "posts/", &err),
            StorageError::List { ref prefix, .. } if prefix == "posts/"
        ));
        assert!(matches!(join_failed(Op::Read, "k", &err), StorageError::Read { .. }));
    }
}
