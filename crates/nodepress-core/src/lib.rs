//! Core library for `NodePress`.
//!
//! Contains the document store, the query translator shared by every listing,
//! the hierarchical menu tree, and the post, user, and settings stores. This
//! crate depends on `nodepress-storage` for the backend trait and knows
//! nothing about HTTP.

pub mod document;
pub mod error;
pub mod id;
pub mod mail;
pub mod menu;
pub mod password;
pub mod post;
pub mod query;
pub mod settings;
pub mod user;
pub mod validation;
