//! The navigation menu: a tree of nodes with materialized ancestor paths.
//!
//! Every [`MenuNode`] carries the full id chain from its root down to its
//! immediate parent in `ancestors`. That makes subtree and ancestor-chain
//! reads a single membership query, at the cost of repairing the chains of
//! every descendant when a node moves.
//!
//! [`MenuTree`] is the only writer of `parentId` and `ancestors`. After any
//! sequence of its mutations:
//!
//! - a node with parent `P` has `ancestors == P.ancestors ++ [P.id]`, and a
//!   root has no ancestors;
//! - `parentId`, when present, names an existing node;
//! - `D` is a descendant of `X` exactly when `X.id` is in `D.ancestors`.
//!
//! Moves and cascading deletes are several storage writes. A reader running
//! concurrently with [`MenuTree::reparent`] can observe the moved node before
//! its descendants are repaired; a node inserted under a subtree while it is
//! being deleted can survive as an orphan.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::{Document, DocumentStore};
use crate::error::MenuError;
use crate::id::DocId;
use crate::query::{FieldKind, FieldTable, Filter, Query, SortOrder};
use crate::validation::{ValidationErrors, trimmed};

const TITLE_MAX: usize = 50;
const URL_MAX: usize = 250;

/// Filterable and sortable fields of menu listings.
pub static MENU_FIELDS: FieldTable = FieldTable {
    fields: &[
        ("id", FieldKind::Identifier),
        ("parentId", FieldKind::Identifier),
        ("ancestors", FieldKind::Identifier),
        ("title", FieldKind::Substring),
        ("url", FieldKind::Substring),
    ],
    sortable: &["title"],
    default_sort: ("title", SortOrder::Ascending),
    min_page_size: 1,
};

/// A stored menu entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuNode {
    pub id: DocId,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<DocId>,
    /// Root-most first, ending with the immediate parent.
    #[serde(default)]
    pub ancestors: Vec<DocId>,
}

impl MenuNode {
    /// Whether this node has no parent.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }
}

impl Document for MenuNode {
    const COLLECTION: &'static str = "menu";

    fn id(&self) -> DocId {
        self.id
    }
}

/// A candidate node as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuDraft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
}

impl MenuDraft {
    /// Check title, url and parent id. Every field is checked.
    ///
    /// # Errors
    ///
    /// Returns the failing fields keyed by their wire names.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        errors.require_text("title", &self.title, TITLE_MAX);
        errors.optional_text("url", self.url.as_deref(), URL_MAX);
        let malformed = self
            .parent_id
            .as_deref()
            .is_some_and(|p| !p.trim().is_empty() && DocId::parse(p).is_none());
        if malformed {
            errors.add("parentId", "parentId must be a valid id");
        }
        errors.into_result()
    }
}

/// Non-structural changes to an existing node.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MenuUpdate {
    #[serde(default)]
    pub title: Option<String>,
    /// An empty string clears the url.
    #[serde(default)]
    pub url: Option<String>,
}

impl MenuUpdate {
    /// Apply the title and url rules to the fields present.
    ///
    /// # Errors
    ///
    /// Returns the failing fields keyed by their wire names.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        if let Some(title) = &self.title {
            errors.require_text("title", title, TITLE_MAX);
        }
        errors.optional_text("url", self.url.as_deref(), URL_MAX);
        errors.into_result()
    }
}

/// Persistence and structural maintenance for menu nodes.
#[derive(Debug, Clone)]
pub struct MenuTree {
    docs: Arc<DocumentStore>,
}

fn descendants_of(id: DocId) -> Filter {
    Filter::equals("ancestors", id.to_string())
}

impl MenuTree {
    #[must_use]
    pub fn new(docs: Arc<DocumentStore>) -> Self {
        Self { docs }
    }

    /// Persist a new node under its requested parent.
    ///
    /// A `parentId` that is malformed or names no existing node is dropped
    /// and the node becomes a root.
    ///
    /// # Errors
    ///
    /// Returns [`MenuError::Store`] if storage fails.
    pub async fn insert(&self, draft: MenuDraft) -> Result<MenuNode, MenuError> {
        let requested = trimmed(draft.parent_id);
        let parent = match requested.as_deref().and_then(DocId::parse) {
            Some(parent_id) => self.docs.get::<MenuNode>(parent_id).await?,
            None => None,
        };
        if let (None, Some(requested)) = (&parent, &requested) {
            warn!(parent_id = %requested, "menu parent not found, inserting as root");
        }

        let (parent_id, ancestors) = match parent {
            Some(p) => {
                let mut chain = p.ancestors;
                chain.push(p.id);
                (Some(p.id), chain)
            }
            None => (None, Vec::new()),
        };

        let node = MenuNode {
            id: DocId::new(),
            title: draft.title.trim().to_owned(),
            url: trimmed(draft.url),
            parent_id,
            ancestors,
        };
        self.docs.put(&node).await?;
        debug!(id = %node.id, depth = node.ancestors.len(), "menu node inserted");
        Ok(node)
    }

    /// Delete a node and its whole subtree. Returns the number of nodes
    /// removed, 0 if `id` does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`MenuError::Store`] if storage fails. Nodes deleted before
    /// the failure stay deleted.
    pub async fn delete_one(&self, id: DocId) -> Result<usize, MenuError> {
        self.delete_many(&[id]).await
    }

    /// Delete several nodes and the union of their subtrees.
    ///
    /// # Errors
    ///
    /// Same as [`MenuTree::delete_one`].
    pub async fn delete_many(&self, ids: &[DocId]) -> Result<usize, MenuError> {
        let mut doomed = BTreeSet::new();
        for &id in ids {
            if self.docs.get::<MenuNode>(id).await?.is_some() {
                doomed.insert(id);
            }
            for node in self.docs.find::<MenuNode>(&descendants_of(id)).await? {
                doomed.insert(node.id);
            }
        }

        let mut deleted = 0;
        for id in doomed {
            if self.docs.delete::<MenuNode>(id).await? {
                deleted += 1;
            }
        }
        debug!(requested = ids.len(), deleted, "menu nodes deleted");
        Ok(deleted)
    }

    /// Change a node's title and/or url. Structure is untouched.
    ///
    /// # Errors
    ///
    /// Returns [`MenuError::Store`] if storage fails.
    pub async fn update_fields(
        &self,
        id: DocId,
        update: MenuUpdate,
    ) -> Result<Option<MenuNode>, MenuError> {
        let Some(mut node) = self.docs.get::<MenuNode>(id).await? else {
            return Ok(None);
        };
        if let Some(title) = update.title {
            node.title = title.trim().to_owned();
        }
        if update.url.is_some() {
            node.url = trimmed(update.url);
        }
        self.docs.put(&node).await?;
        debug!(%id, "menu node updated");
        Ok(Some(node))
    }

    /// Move a node under `new_parent`, or make it a root when `None`.
    ///
    /// Every descendant keeps its path below the moved node and is re-rooted
    /// under the new chain. Returns `Ok(None)` if the node or the new parent
    /// does not exist.
    ///
    /// # Errors
    ///
    /// - [`MenuError::Cycle`] if `new_parent` is the node or one of its
    ///   descendants. Nothing is written.
    /// - [`MenuError::Store`] if storage fails. The node may already be
    ///   moved with some descendants not yet repaired.
    pub async fn reparent(
        &self,
        id: DocId,
        new_parent: Option<DocId>,
    ) -> Result<Option<MenuNode>, MenuError> {
        let Some(mut target) = self.docs.get::<MenuNode>(id).await? else {
            return Ok(None);
        };

        let new_ancestors = match new_parent {
            None => Vec::new(),
            Some(parent_id) => {
                if parent_id == id {
                    return Err(MenuError::Cycle { id, parent_id });
                }
                let Some(parent) = self.docs.get::<MenuNode>(parent_id).await? else {
                    return Ok(None);
                };
                if parent.ancestors.contains(&id) {
                    return Err(MenuError::Cycle { id, parent_id });
                }
                let mut chain = parent.ancestors;
                chain.push(parent.id);
                chain
            }
        };

        let descendants = self.docs.find::<MenuNode>(&descendants_of(id)).await?;
        let old_ancestors = std::mem::replace(&mut target.ancestors, new_ancestors.clone());
        target.parent_id = new_parent;
        self.docs.put(&target).await?;

        for mut node in descendants {
            node.ancestors.retain(|a| !old_ancestors.contains(a));
            let mut chain = new_ancestors.clone();
            chain.append(&mut node.ancestors);
            node.ancestors = chain;
            self.docs.put(&node).await?;
        }

        info!(%id, parent = ?new_parent, "menu node moved");
        Ok(Some(target))
    }

    /// Load a single node.
    ///
    /// # Errors
    ///
    /// Returns [`MenuError::Store`] if storage fails.
    pub async fn get(&self, id: DocId) -> Result<Option<MenuNode>, MenuError> {
        Ok(self.docs.get(id).await?)
    }

    /// The node followed by all of its descendants, shallowest first.
    /// Empty if the node does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`MenuError::Store`] if storage fails.
    pub async fn subtree(&self, id: DocId) -> Result<Vec<MenuNode>, MenuError> {
        let Some(node) = self.docs.get::<MenuNode>(id).await? else {
            return Ok(Vec::new());
        };
        let mut descendants = self.docs.find::<MenuNode>(&descendants_of(id)).await?;
        descendants.sort_by_key(|n| n.ancestors.len());

        let mut nodes = Vec::with_capacity(descendants.len() + 1);
        nodes.push(node);
        nodes.append(&mut descendants);
        Ok(nodes)
    }

    /// The node's ancestors from the root down, followed by the node itself.
    /// Empty if the node does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`MenuError::Store`] if storage fails.
    pub async fn ancestor_chain(&self, id: DocId) -> Result<Vec<MenuNode>, MenuError> {
        let Some(node) = self.docs.get::<MenuNode>(id).await? else {
            return Ok(Vec::new());
        };
        let mut chain = Vec::with_capacity(node.ancestors.len() + 1);
        for &ancestor in &node.ancestors {
            if let Some(a) = self.docs.get::<MenuNode>(ancestor).await? {
                chain.push(a);
            }
        }
        chain.push(node);
        Ok(chain)
    }

    /// A filtered, sorted page of nodes.
    ///
    /// # Errors
    ///
    /// Returns [`MenuError::Store`] if storage fails.
    pub async fn list(&self, query: &Query) -> Result<Vec<MenuNode>, MenuError> {
        Ok(self.docs.query(query).await?)
    }
}
