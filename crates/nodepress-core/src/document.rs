//! Typed JSON document collections over a storage backend.
//!
//! The document store is the only component that touches the
//! [`StorageBackend`]. Each document type names its collection, and every
//! document is stored as JSON under `<collection>/<id>`. Query predicates
//! are evaluated against the stored JSON, so any backend that can
//! prefix-scan supports equality, substring, and range filters.
//!
//! Every method is a single backend call or a scan followed by independent
//! calls; nothing here is transactional across documents.

use std::sync::Arc;

use nodepress_storage::StorageBackend;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use crate::error::StoreError;
use crate::id::DocId;
use crate::query::{Filter, Query};

/// A type stored as one JSON document per id inside a named collection.
pub trait Document: Serialize + DeserializeOwned + Send + Sync {
    /// Key prefix segment for this collection (e.g. `menu`).
    const COLLECTION: &'static str;

    /// The document's identifier.
    fn id(&self) -> DocId;
}

/// Typed JSON persistence over a shared storage backend.
pub struct DocumentStore {
    storage: Arc<dyn StorageBackend>,
}

impl std::fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

fn document_key<D: Document>(id: DocId) -> String {
    format!("{}/{id}", D::COLLECTION)
}

fn collection_prefix<D: Document>() -> String {
    format!("{}/", D::COLLECTION)
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

fn encode<T: Serialize>(collection: &str, value: &T) -> Result<Vec<u8>, StoreError> {
    serde_json::to_vec(value).map_err(|e| StoreError::Serialization {
        collection: collection.to_owned(),
        reason: e.to_string(),
    })
}

impl DocumentStore {
    /// Create a document store over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Load a document by id. Returns `Ok(None)` if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Storage`] if the backend fails.
    /// - [`StoreError::Corrupt`] if the stored bytes are not a valid document.
    pub async fn get<D: Document>(&self, id: DocId) -> Result<Option<D>, StoreError> {
        let key = document_key::<D>(id);
        match self.storage.get(&key).await? {
            None => Ok(None),
            Some(bytes) => decode(&key, &bytes).map(Some),
        }
    }

    /// Insert or overwrite a document.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Serialization`] if the document cannot be encoded.
    /// - [`StoreError::Storage`] if the backend fails.
    pub async fn put<D: Document>(&self, doc: &D) -> Result<(), StoreError> {
        let bytes = encode(D::COLLECTION, doc)?;
        self.storage.put(&document_key::<D>(doc.id()), &bytes).await?;
        Ok(())
    }

    /// Delete a document, returning whether it existed.
    ///
    /// The existence check and the delete are two backend calls.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the backend fails.
    pub async fn delete<D: Document>(&self, id: DocId) -> Result<bool, StoreError> {
        let key = document_key::<D>(id);
        if !self.storage.exists(&key).await? {
            return Ok(false);
        }
        self.storage.delete(&key).await?;
        Ok(true)
    }

    /// Every document in the collection, in storage order.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Storage`] if the backend fails.
    /// - [`StoreError::Corrupt`] if any stored value fails to decode.
    pub async fn all<D: Document>(&self) -> Result<Vec<D>, StoreError> {
        let entries = self.storage.scan(&collection_prefix::<D>()).await?;
        entries
            .iter()
            .map(|(key, bytes)| decode(key, bytes))
            .collect()
    }

    /// Documents matching `filter`, in storage order.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::all`].
    pub async fn find<D: Document>(&self, filter: &Filter) -> Result<Vec<D>, StoreError> {
        let matched = self.matching_values::<D>(filter).await?;
        matched
            .into_iter()
            .map(|(key, value)| from_value(&key, value))
            .collect()
    }

    /// Documents matching the query's filter, sorted and paged by its options.
    ///
    /// # Errors
    ///
    /// Same as [`DocumentStore::all`].
    pub async fn query<D: Document>(&self, query: &Query) -> Result<Vec<D>, StoreError> {
        let matched = self.matching_values::<D>(&query.filter).await?;
        let total = matched.len();
        let page = query.options.apply(matched);
        debug!(
            collection = D::COLLECTION,
            matched = total,
            returned = page.len(),
            "query executed"
        );
        page.into_iter()
            .map(|(key, value)| from_value(&key, value))
            .collect()
    }

    /// Read a singleton value stored under a fixed key (e.g. `settings/site`).
    ///
    /// # Errors
    ///
    /// - [`StoreError::Storage`] if the backend fails.
    /// - [`StoreError::Corrupt`] if the stored bytes fail to decode.
    pub async fn get_singleton<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.storage.get(key).await? {
            None => Ok(None),
            Some(bytes) => decode(key, &bytes).map(Some),
        }
    }

    /// Write a singleton value under a fixed key.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Serialization`] if the value cannot be encoded.
    /// - [`StoreError::Storage`] if the backend fails.
    pub async fn put_singleton<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = encode(key, value)?;
        self.storage.put(key, &bytes).await?;
        Ok(())
    }

    /// Whether a singleton key is present.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the backend fails.
    pub async fn singleton_exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.storage.exists(key).await?)
    }

    async fn matching_values<D: Document>(
        &self,
        filter: &Filter,
    ) -> Result<Vec<(String, Value)>, StoreError> {
        let entries = self.storage.scan(&collection_prefix::<D>()).await?;
        let mut matched = Vec::new();
        for (key, bytes) in entries {
            let value: Value = decode(&key, &bytes)?;
            if filter.matches(&value) {
                matched.push((key, value));
            }
        }
        Ok(matched)
    }
}

fn from_value<D: Document>(key: &str, value: Value) -> Result<D, StoreError> {
    serde_json::from_value(value).map_err(|e| StoreError::Corrupt {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use nodepress_storage::MemoryBackend;
    use serde::Deserialize;
    use serde_json::json;

    use super::*;
    use crate::query::{FieldKind, FieldTable, SortOrder, translate};

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: DocId,
        text: String,
        rank: u32,
    }

    impl Document for Note {
        const COLLECTION: &'static str = "notes";

        fn id(&self) -> DocId {
            self.id
        }
    }

    static NOTE_FIELDS: FieldTable = FieldTable {
        fields: &[("text", FieldKind::Substring), ("rank", FieldKind::Range)],
        sortable: &["rank"],
        default_sort: ("rank", SortOrder::Ascending),
        min_page_size: 1,
    };

    fn note(text: &str, rank: u32) -> Note {
        Note {
            id: DocId::new(),
            text: text.to_owned(),
            rank,
        }
    }

    fn make_store() -> (MemoryBackend, DocumentStore) {
        let backend = MemoryBackend::new();
        let store = DocumentStore::new(Arc::new(backend.clone()));
        (backend, store)
    }

    #[tokio::test]
    async fn put_then_get() {
        let (_, store) = make_store();
        let n = note("hello", 1);
        store.put(&n).await.unwrap();
        assert_eq!(store.get::<Note>(n.id).await.unwrap(), Some(n));
    }

    #[tokio::test]
    async fn get_missing_is_none() {
        let (_, store) = make_store();
        assert_eq!(store.get::<Note>(DocId::new()).await.unwrap(), None);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let (_, store) = make_store();
        let n = note("bye", 1);
        store.put(&n).await.unwrap();
        assert!(store.delete::<Note>(n.id).await.unwrap());
        assert!(!store.delete::<Note>(n.id).await.unwrap());
    }

    #[tokio::test]
    async fn corrupt_value_is_reported_with_key() {
        let (backend, store) = make_store();
        let id = DocId::new();
        backend
            .put(&format!("notes/{id}"), b"not json")
            .await
            .unwrap();
        let err = store.get::<Note>(id).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { ref key, .. } if key.ends_with(&id.to_string())));
    }

    #[tokio::test]
    async fn query_filters_sorts_and_pages() {
        let (_, store) = make_store();
        for (text, rank) in [("apple", 3), ("apricot", 1), ("banana", 2), ("grape", 4)] {
            store.put(&note(text, rank)).await.unwrap();
        }

        let query = translate(&json!({"text": "AP", "pageSize": 2}), &NOTE_FIELDS);
        let found: Vec<Note> = store.query(&query).await.unwrap();
        let texts: Vec<_> = found.iter().map(|n| n.text.as_str()).collect();
        assert_eq!(texts, vec!["apricot", "apple"]);

        let query = translate(&json!({"rank": {"from": 2, "to": 3}}), &NOTE_FIELDS);
        let found: Vec<Note> = store.query(&query).await.unwrap();
        assert_eq!(found.len(), 2);
    }

    #[tokio::test]
    async fn singleton_roundtrip() {
        let (_, store) = make_store();
        assert!(!store.singleton_exists("meta/site").await.unwrap());
        store.put_singleton("meta/site", &json!({"a": 1})).await.unwrap();
        let value: Option<Value> = store.get_singleton("meta/site").await.unwrap();
        assert_eq!(value, Some(json!({"a": 1})));
    }
}
