//! HTTP route handlers, one module per resource.

pub mod menus;
pub mod posts;
pub mod settings;
pub mod users;

use std::sync::Arc;

use axum::Router;
use axum::http::{HeaderValue, Method, header};
use nodepress_core::id::DocId;
use serde::{Deserialize, Serialize};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Build the full API router with all routes and middleware.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .nest("/v1/menus", menus::router())
        .nest("/v1/posts", posts::router())
        .nest("/v1/users", users::router())
        .merge(settings::router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state)
}

// ── Shared request / response types ──────────────────────────────────

/// Body of bulk operations: `{"ids": [...]}`.
#[derive(Debug, Deserialize)]
pub struct IdsRequest {
    pub ids: Vec<DocId>,
}

#[derive(Debug, Serialize)]
pub struct DeletedResponse {
    pub deleted: usize,
}

#[derive(Debug, Serialize)]
pub struct ModifiedResponse {
    pub modified: usize,
}
