//! Error types for `nodepress-core`.
//!
//! Not-found is never an error here: lookups return `Option` and deletes
//! return counts. Storage failures propagate unchanged inside
//! [`StoreError::Storage`]; nothing is retried.

use nodepress_storage::StorageError;

use crate::id::DocId;
use crate::validation::ValidationErrors;

/// Errors from the document store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying storage backend returned an error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),

    /// A document could not be serialized for writing.
    #[error("failed to serialize {collection} document: {reason}")]
    Serialization { collection: String, reason: String },

    /// A stored value could not be decoded as the expected document type.
    #[error("corrupt document at '{key}': {reason}")]
    Corrupt { key: String, reason: String },
}

/// Errors from menu tree mutations.
#[derive(Debug, thiserror::Error)]
pub enum MenuError {
    /// The requested parent is the node itself or one of its descendants.
    #[error("cannot move menu {id} under {parent_id}: the parent lies inside its own subtree")]
    Cycle { id: DocId, parent_id: DocId },

    /// The document store returned an error.
    #[error("menu store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the user store.
#[derive(Debug, thiserror::Error)]
pub enum UserError {
    /// Another account already uses this e-mail address.
    #[error("email already registered: {email}")]
    EmailTaken { email: String },

    /// The draft failed field validation.
    #[error("invalid user: {0}")]
    Invalid(ValidationErrors),

    /// A password could not be hashed.
    #[error("password hashing failed: {reason}")]
    Password { reason: String },

    /// The document store returned an error.
    #[error("user store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from the settings store.
#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    /// The merged settings failed field validation.
    #[error("invalid settings: {0}")]
    Invalid(ValidationErrors),

    /// The document store returned an error.
    #[error("settings store error: {0}")]
    Store(#[from] StoreError),
}

/// Errors from outbound mail.
#[derive(Debug, thiserror::Error)]
pub enum MailError {
    /// The transport refused or failed to deliver the message.
    #[error("mail transport failed for '{to}': {reason}")]
    Transport { to: String, reason: String },
}
