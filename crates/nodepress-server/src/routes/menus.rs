//! Menu routes: `/v1/menus/*`
//!
//! Listing, creation, field updates, re-parenting, and cascading deletes
//! over the menu tree.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use nodepress_core::id::DocId;
use nodepress_core::menu::{MENU_FIELDS, MenuDraft, MenuNode, MenuUpdate};
use nodepress_core::query::{params_from_query, translate};

use super::{DeletedResponse, IdsRequest};
use crate::error::AppError;
use crate::state::AppState;

/// Build the `/v1/menus` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_menus).post(create_menu).delete(delete_menus))
        .route("/search", post(search_menus))
        .route(
            "/{id}",
            get(get_with_ancestors).put(update_menu).delete(delete_menu),
        )
        .route("/{id}/descendants", get(get_with_descendants))
        .route("/{id}/parent", put(reparent_menu))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReparentRequest {
    #[serde(default)]
    pub parent_id: Option<DocId>,
}

fn not_found(id: DocId) -> AppError {
    AppError::NotFound(format!("menu {id} not found"))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Filtered list from query-string parameters.
async fn list_menus(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<MenuNode>>, AppError> {
    let query = translate(&params_from_query(pairs), &MENU_FIELDS);
    Ok(Json(state.menus.list(&query).await?))
}

/// Filtered list from a JSON parameter object.
async fn search_menus(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Result<Json<Vec<MenuNode>>, AppError> {
    let query = translate(&params, &MENU_FIELDS);
    Ok(Json(state.menus.list(&query).await?))
}

async fn create_menu(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<MenuDraft>,
) -> Result<(StatusCode, Json<MenuNode>), AppError> {
    draft.validate()?;
    let node = state.menus.insert(draft).await?;
    Ok((StatusCode::CREATED, Json(node)))
}

/// The root-first ancestor chain, ending with the node itself.
async fn get_with_ancestors(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
) -> Result<Json<Vec<MenuNode>>, AppError> {
    let chain = state.menus.ancestor_chain(id).await?;
    if chain.is_empty() {
        return Err(not_found(id));
    }
    Ok(Json(chain))
}

/// The node followed by its whole subtree.
async fn get_with_descendants(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
) -> Result<Json<Vec<MenuNode>>, AppError> {
    let nodes = state.menus.subtree(id).await?;
    if nodes.is_empty() {
        return Err(not_found(id));
    }
    Ok(Json(nodes))
}

async fn update_menu(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
    Json(update): Json<MenuUpdate>,
) -> Result<Json<MenuNode>, AppError> {
    update.validate()?;
    let node = state
        .menus
        .update_fields(id, update)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(node))
}

async fn reparent_menu(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
    Json(body): Json<ReparentRequest>,
) -> Result<Json<MenuNode>, AppError> {
    let node = state
        .menus
        .reparent(id, body.parent_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("menu {id} or its new parent not found")))?;
    Ok(Json(node))
}

async fn delete_menu(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.menus.delete_one(id).await?;
    Ok(Json(DeletedResponse { deleted }))
}

async fn delete_menus(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IdsRequest>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.menus.delete_many(&body.ids).await?;
    Ok(Json(DeletedResponse { deleted }))
}
