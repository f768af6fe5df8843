//! Shared application state for `NodePress` server.
//!
//! A single [`AppState`] is constructed at startup and shared across all
//! Axum handlers via `Arc`. Every store sits on the same document store and
//! storage backend.

use std::sync::Arc;

use nodepress_core::document::DocumentStore;
use nodepress_core::mail::Mailer;
use nodepress_core::menu::MenuTree;
use nodepress_core::password::BcryptPasswordHasher;
use nodepress_core::post::PostStore;
use nodepress_core::settings::SettingsStore;
use nodepress_core::user::UserStore;
use nodepress_storage::StorageBackend;

/// Shared application state passed to all HTTP handlers.
pub struct AppState {
    /// Menu tree with materialized ancestor paths.
    pub menus: MenuTree,
    /// Blog posts.
    pub posts: PostStore,
    /// User accounts.
    pub users: UserStore,
    /// Site settings singleton.
    pub settings: SettingsStore,
    /// Account e-mail renderer.
    pub mailer: Mailer,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}

impl AppState {
    /// Build every store over one storage backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>, mailer: Mailer) -> Self {
        let docs = Arc::new(DocumentStore::new(storage));
        Self {
            menus: MenuTree::new(Arc::clone(&docs)),
            posts: PostStore::new(Arc::clone(&docs)),
            users: UserStore::new(Arc::clone(&docs), Arc::new(BcryptPasswordHasher::default())),
            settings: SettingsStore::new(docs),
            mailer,
        }
    }
}
