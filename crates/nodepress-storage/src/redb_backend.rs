//! Pure-Rust redb storage backend, the default for persistent deployments.
//!
//! Every collection lives in one `documents` table; the collection name is
//! the key prefix. Each call opens its own redb transaction, so a single
//! `put` or `delete` is atomic but a sequence of calls is not.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use redb::{Database, ReadableTable, TableDefinition, WriteTransaction};

use crate::{StorageBackend, StorageError};

const DOCUMENTS: TableDefinition<&str, &[u8]> = TableDefinition::new("documents");

/// A storage backend backed by a single redb database file.
///
/// Blocking redb calls are offloaded to the Tokio blocking thread pool.
///
/// # Examples
///
/// ```no_run
/// # use nodepress_storage::RedbBackend;
/// let backend = RedbBackend::open("/var/lib/nodepress/data.redb").unwrap();
/// ```
#[derive(Clone)]
pub struct RedbBackend {
    db: Arc<Database>,
    path: PathBuf,
}

impl std::fmt::Debug for RedbBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedbBackend")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn transaction_error(e: impl std::fmt::Display) -> StorageError {
    StorageError::Transaction {
        reason: e.to_string(),
    }
}

fn missing_table(e: impl std::fmt::Display) -> StorageError {
    StorageError::MissingTable {
        name: format!("documents: {e}"),
    }
}

fn panicked(e: &tokio::task::JoinError) -> StorageError {
    StorageError::Transaction {
        reason: format!("blocking task panicked: {e}"),
    }
}

/// Run `op` inside a write transaction and commit it.
fn with_write<F>(db: &Database, op: F) -> Result<(), StorageError>
where
    F: FnOnce(&WriteTransaction) -> Result<(), StorageError>,
{
    let txn = db.begin_write().map_err(transaction_error)?;
    op(&txn)?;
    txn.commit().map_err(transaction_error)
}

impl RedbBackend {
    /// Open or create a redb database at the given path.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if redb fails to open or create the
    /// file, or [`StorageError::Transaction`] if the documents table cannot
    /// be created.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let path = path.as_ref();
        let db = Database::create(path).map_err(|e| StorageError::Open {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        // Opening the table inside a write transaction creates it.
        with_write(&db, |txn| {
            txn.open_table(DOCUMENTS).map_err(missing_table)?;
            Ok(())
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

    fn scan_blocking(db: &Database, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let list_error = |e: redb::StorageError| StorageError::List {
            prefix: prefix.to_owned(),
            reason: e.to_string(),
        };

        let txn = db.begin_read().map_err(transaction_error)?;
        let table = txn.open_table(DOCUMENTS).map_err(missing_table)?;

        let mut entries = Vec::new();
        for item in table.range(prefix..).map_err(list_error)? {
            let (k, v) = item.map_err(list_error)?;
            let key = k.value();
            if !key.starts_with(prefix) {
                break;
            }
            entries.push((key.to_owned(), v.value().to_vec()));
        }
        Ok(entries)
    }
}

#[async_trait::async_trait]
impl StorageBackend for RedbBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || {
            let txn = db.begin_read().map_err(transaction_error)?;
            let table = txn.open_table(DOCUMENTS).map_err(missing_table)?;
            let value = table
                .get(key.as_str())
                .map_err(|e| StorageError::Read {
                    key: key.clone(),
                    reason: e.to_string(),
                })?
                .map(|v| v.value().to_vec());
            Ok(value)
        })
        .await
        .map_err(|e| panicked(&e))?
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        let value = value.to_vec();
        tokio::task::spawn_blocking(move || {
            with_write(&db, |txn| {
                let mut table = txn.open_table(DOCUMENTS).map_err(missing_table)?;
                table
                    .insert(key.as_str(), value.as_slice())
                    .map_err(|e| StorageError::Write {
                        key: key.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(())
            })
        })
        .await
        .map_err(|e| panicked(&e))?
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let db = Arc::clone(&self.db);
        let key = key.to_owned();
        tokio::task::spawn_blocking(move || {
            with_write(&db, |txn| {
                let mut table = txn.open_table(DOCUMENTS).map_err(missing_table)?;
                table
                    .remove(key.as_str())
                    .map_err(|e| StorageError::Delete {
                        key: key.clone(),
                        reason: e.to_string(),
                    })?;
                Ok(())
            })
        })
        .await
        .map_err(|e| panicked(&e))?
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let entries = self.scan(prefix).await?;
        Ok(entries.into_iter().map(|(k, _)| k).collect())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let db = Arc::clone(&self.db);
        let prefix = prefix.to_owned();
        tokio::task::spawn_blocking(move || Self::scan_blocking(&db, &prefix))
            .await
            .map_err(|e| panicked(&e))?
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn open_temp() -> (tempfile::TempDir, RedbBackend) {
        let dir = tempfile::tempdir().unwrap();
        let backend = RedbBackend::open(dir.path().join("nodepress.redb")).unwrap();
        (dir, backend)
    }

    #[tokio::test]
    async fn put_get_delete() {
        let (_dir, backend) = open_temp();
        backend.put("menu/a", b"{\"title\":\"a\"}").await.unwrap();
        assert_eq!(
            backend.get("menu/a").await.unwrap(),
            Some(b"{\"title\":\"a\"}".to_vec())
        );
        backend.delete("menu/a").await.unwrap();
        assert_eq!(backend.get("menu/a").await.unwrap(), None);
    }

    #[tokio::test]
    async fn scan_stops_at_prefix_boundary() {
        let (_dir, backend) = open_temp();
        backend.put("menu/1", b"a").await.unwrap();
        backend.put("menu/2", b"b").await.unwrap();
        backend.put("posts/1", b"c").await.unwrap();

        let entries = backend.scan("menu/").await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(backend.list("posts/").await.unwrap(), vec!["posts/1"]);
    }

    #[tokio::test]
    async fn reopen_keeps_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nodepress.redb");
        {
            let backend = RedbBackend::open(&path).unwrap();
            backend.put("settings/site", b"{}").await.unwrap();
        }
        let backend = RedbBackend::open(&path).unwrap();
        assert!(backend.exists("settings/site").await.unwrap());
    }
}
