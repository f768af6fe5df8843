//! `NodePress` HTTP server.
//!
//! Wires the core stores and a storage backend into an Axum router serving
//! the JSON API at `/v1/*`.

pub mod config;
pub mod error;
pub mod routes;
pub mod state;
