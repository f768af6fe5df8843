//! Blog posts.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use crate::document::{Document, DocumentStore};
use crate::error::StoreError;
use crate::id::DocId;
use crate::query::{FieldKind, FieldTable, Filter, Query, SortOrder};
use crate::validation::{ValidationErrors, trimmed};

const SUB_TITLE_MAX: usize = 50;
const TITLE_MAX: usize = 250;
const URL_TITLE_MAX: usize = 50;
const TAG_MAX: usize = 50;

/// Filterable and sortable fields of post listings.
pub static POST_FIELDS: FieldTable = FieldTable {
    fields: &[
        ("id", FieldKind::Identifier),
        ("display", FieldKind::Exact),
        ("author", FieldKind::Substring),
        ("subTitle", FieldKind::Substring),
        ("title", FieldKind::Substring),
        ("content", FieldKind::Substring),
        ("urlTitle", FieldKind::Substring),
        ("tags", FieldKind::Substring),
        ("publish", FieldKind::Timestamp),
    ],
    sortable: &["author", "subTitle", "title", "urlTitle", "publish"],
    default_sort: ("publish", SortOrder::Descending),
    min_page_size: 10,
};

/// A stored post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Post {
    pub id: DocId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_title: Option<String>,
    pub title: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url_title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub publish: DateTime<Utc>,
    pub display: bool,
    pub show_in_feed: bool,
}

impl Document for Post {
    const COLLECTION: &'static str = "posts";

    fn id(&self) -> DocId {
        self.id
    }
}

/// Editable post fields as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PostDraft {
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub sub_title: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub url_title: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub publish: Option<DateTime<Utc>>,
    #[serde(default)]
    pub display: Option<bool>,
    #[serde(default)]
    pub show_in_feed: Option<bool>,
}

impl PostDraft {
    /// Check every field of the draft.
    ///
    /// # Errors
    ///
    /// Returns the failing fields keyed by their wire names.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.optional_text("subTitle", self.sub_title.as_deref(), SUB_TITLE_MAX);
        errors.require_text("title", &self.title, TITLE_MAX);
        errors.require_text("content", &self.content, usize::MAX);
        errors.optional_text("urlTitle", self.url_title.as_deref(), URL_TITLE_MAX);
        errors.text_list("tags", &self.tags, TAG_MAX);
        errors.into_result()
    }

    /// Overwrite the editable fields of `post`. Omitted flags and publish
    /// date keep their current values.
    fn apply_to(self, post: &mut Post) {
        post.author = trimmed(self.author);
        post.sub_title = trimmed(self.sub_title);
        post.title = self.title.trim().to_owned();
        post.content = self.content.trim().to_owned();
        post.url_title = trimmed(self.url_title);
        post.tags = self.tags.iter().map(|t| t.trim().to_owned()).collect();
        if let Some(publish) = self.publish {
            post.publish = publish;
        }
        if let Some(display) = self.display {
            post.display = display;
        }
        if let Some(show) = self.show_in_feed {
            post.show_in_feed = show;
        }
    }
}

/// Force a listing to hidden-post-free results, whatever the caller asked.
#[must_use]
pub fn visible_only(params: Value) -> Value {
    let mut map = match params {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    map.insert("display".to_owned(), Value::Bool(true));
    Value::Object(map)
}

/// Persistence for posts.
#[derive(Debug, Clone)]
pub struct PostStore {
    docs: Arc<DocumentStore>,
}

impl PostStore {
    #[must_use]
    pub fn new(docs: Arc<DocumentStore>) -> Self {
        Self { docs }
    }

    /// Persist a new post. `publish` defaults to now, both flags to `true`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if storage fails.
    pub async fn create(&self, draft: PostDraft) -> Result<Post, StoreError> {
        let mut post = Post {
            id: DocId::new(),
            author: None,
            sub_title: None,
            title: String::new(),
            content: String::new(),
            url_title: None,
            tags: Vec::new(),
            publish: Utc::now(),
            display: true,
            show_in_feed: true,
        };
        draft.apply_to(&mut post);
        self.docs.put(&post).await?;
        debug!(id = %post.id, "post created");
        Ok(post)
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] if storage fails.
    pub async fn get(&self, id: DocId) -> Result<Option<Post>, StoreError> {
        self.docs.get(id).await
    }

    /// # Errors
    ///
    /// Returns [`StoreError`] if storage fails.
    pub async fn list(&self, query: &Query) -> Result<Vec<Post>, StoreError> {
        self.docs.query(query).await
    }

    /// The first post (in storage order) matching `filter`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if storage fails.
    pub async fn find_one(&self, filter: &Filter) -> Result<Option<Post>, StoreError> {
        Ok(self.docs.find(filter).await?.into_iter().next())
    }

    /// Replace the editable fields of an existing post.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if storage fails.
    pub async fn update(&self, id: DocId, draft: PostDraft) -> Result<Option<Post>, StoreError> {
        let Some(mut post) = self.docs.get::<Post>(id).await? else {
            return Ok(None);
        };
        draft.apply_to(&mut post);
        self.docs.put(&post).await?;
        debug!(%id, "post updated");
        Ok(Some(post))
    }

    /// Delete a post, returning it if it existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if storage fails.
    pub async fn delete_one(&self, id: DocId) -> Result<Option<Post>, StoreError> {
        let Some(post) = self.docs.get::<Post>(id).await? else {
            return Ok(None);
        };
        self.docs.delete::<Post>(id).await?;
        debug!(%id, "post deleted");
        Ok(Some(post))
    }

    /// Delete every listed post. Returns how many existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if storage fails.
    pub async fn delete_many(&self, ids: &[DocId]) -> Result<usize, StoreError> {
        let mut deleted = 0;
        for &id in ids {
            if self.docs.delete::<Post>(id).await? {
                deleted += 1;
            }
        }
        debug!(requested = ids.len(), deleted, "posts deleted");
        Ok(deleted)
    }

    /// Show or hide the listed posts. Returns how many actually changed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] if storage fails.
    pub async fn set_display(&self, ids: &[DocId], display: bool) -> Result<usize, StoreError> {
        let mut modified = 0;
        for &id in ids {
            let Some(mut post) = self.docs.get::<Post>(id).await? else {
                continue;
            };
            if post.display != display {
                post.display = display;
                self.docs.put(&post).await?;
                modified += 1;
            }
        }
        let visible = display;
        debug!(visible, modified, "post visibility changed");
        Ok(modified)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use nodepress_storage::MemoryBackend;
    use serde_json::json;

    use super::*;
    use crate::query::translate;

    fn make_store() -> PostStore {
        PostStore::new(Arc::new(DocumentStore::new(Arc::new(MemoryBackend::new()))))
    }

    fn draft(title: &str) -> PostDraft {
        PostDraft {
            title: title.to_owned(),
            content: format!("{title} body"),
            ..PostDraft::default()
        }
    }

    fn dated(title: &str, y: i32, m: u32, d: u32) -> PostDraft {
        PostDraft {
            publish: Some(Utc.with_ymd_and_hms(y, m, d, 12, 0, 0).unwrap()),
            ..draft(title)
        }
    }

    #[test]
    fn validation_collects_post_fields() {
        let bad = PostDraft {
            sub_title: Some("s".repeat(51)),
            title: " ".to_owned(),
            content: String::new(),
            url_title: Some("u".repeat(51)),
            tags: vec!["ok".to_owned(), "t".repeat(51)],
            ..PostDraft::default()
        };
        let errors = bad.validate().unwrap_err();
        assert_eq!(
            errors.fields().collect::<Vec<_>>(),
            vec!["content", "subTitle", "tags", "title", "urlTitle"]
        );
        assert!(draft("fine").validate().is_ok());
    }

    #[tokio::test]
    async fn create_applies_defaults_and_trims() {
        let store = make_store();
        let post = store
            .create(PostDraft {
                tags: vec![" rust ".to_owned()],
                author: Some("  ".to_owned()),
                ..draft("  Hello  ")
            })
            .await
            .unwrap();
        assert_eq!(post.title, "Hello");
        assert_eq!(post.tags, vec!["rust"]);
        assert_eq!(post.author, None);
        assert!(post.display);
        assert!(post.show_in_feed);
        assert_eq!(store.get(post.id).await.unwrap(), Some(post));
    }

    #[tokio::test]
    async fn list_defaults_to_newest_first() {
        let store = make_store();
        store.create(dated("old", 2023, 1, 1)).await.unwrap();
        store.create(dated("new", 2024, 6, 1)).await.unwrap();
        store.create(dated("mid", 2024, 1, 1)).await.unwrap();

        let posts = store.list(&translate(&json!({}), &POST_FIELDS)).await.unwrap();
        let titles: Vec<_> = posts.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(titles, vec!["new", "mid", "old"]);
    }

    #[tokio::test]
    async fn list_filters_by_publish_range_and_tag() {
        let store = make_store();
        store
            .create(PostDraft {
                tags: vec!["Rust".to_owned(), "async".to_owned()],
                ..dated("a", 2024, 3, 1)
            })
            .await
            .unwrap();
        store.create(dated("b", 2024, 8, 1)).await.unwrap();
        store.create(dated("c", 2023, 3, 1)).await.unwrap();

        let range = json!({ "publish": { "from": "2024-01-01", "to": "2024-12-31" } });
        assert_eq!(store.list(&translate(&range, &POST_FIELDS)).await.unwrap().len(), 2);

        let tag = json!({ "tags": "rus" });
        let posts = store.list(&translate(&tag, &POST_FIELDS)).await.unwrap();
        assert_eq!(posts.len(), 1);
        assert_eq!(posts[0].title, "a");
    }

    #[tokio::test]
    async fn visible_only_hides_hidden_posts() {
        let store = make_store();
        let shown = store.create(draft("shown")).await.unwrap();
        store
            .create(PostDraft {
                display: Some(false),
                ..draft("hidden")
            })
            .await
            .unwrap();

        let params = visible_only(json!({ "display": false }));
        assert_eq!(params["display"], json!(true));
        let posts = store.list(&translate(&params, &POST_FIELDS)).await.unwrap();
        assert_eq!(posts, vec![shown]);

        assert_eq!(visible_only(json!(null)), json!({ "display": true }));
    }

    #[tokio::test]
    async fn update_keeps_id_and_unspecified_flags() {
        let store = make_store();
        let post = store
            .create(PostDraft {
                show_in_feed: Some(false),
                ..dated("first", 2024, 1, 1)
            })
            .await
            .unwrap();

        let updated = store.update(post.id, draft("second")).await.unwrap().unwrap();
        assert_eq!(updated.id, post.id);
        assert_eq!(updated.title, "second");
        assert_eq!(updated.publish, post.publish);
        assert!(!updated.show_in_feed);

        assert!(store.update(DocId::new(), draft("x")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn find_one_and_deletes() {
        let store = make_store();
        let a = store.create(draft("alpha")).await.unwrap();
        let b = store.create(draft("beta")).await.unwrap();
        let c = store.create(draft("gamma")).await.unwrap();

        let found = store
            .find_one(&Filter::equals("title", "beta"))
            .await
            .unwrap();
        assert_eq!(found, Some(b.clone()));

        assert_eq!(store.delete_one(a.id).await.unwrap(), Some(a.clone()));
        assert_eq!(store.delete_one(a.id).await.unwrap(), None);
        assert_eq!(store.delete_many(&[a.id, b.id, c.id]).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn set_display_counts_real_changes() {
        let store = make_store();
        let a = store.create(draft("a")).await.unwrap();
        let b = store
            .create(PostDraft {
                display: Some(false),
                ..draft("b")
            })
            .await
            .unwrap();

        let modified = store
            .set_display(&[a.id, b.id, DocId::new()], false)
            .await
            .unwrap();
        assert_eq!(modified, 1);
        assert!(!store.get(a.id).await.unwrap().unwrap().display);
    }
}
