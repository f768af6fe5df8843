//! Post routes: `/v1/posts/*`
//!
//! The query-string listing only ever returns displayed posts; the JSON
//! search sees everything.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use nodepress_core::id::DocId;
use nodepress_core::post::{POST_FIELDS, Post, PostDraft, visible_only};
use nodepress_core::query::{params_from_query, translate};

use super::{DeletedResponse, IdsRequest, ModifiedResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Build the `/v1/posts` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_posts).post(create_post).delete(delete_posts))
        .route("/search", post(search_posts))
        .route("/display", put(set_display))
        .route("/{id}", get(get_post).put(update_post).delete(delete_post))
}

#[derive(Debug, Deserialize)]
pub struct DisplayRequest {
    pub ids: Vec<DocId>,
    pub display: bool,
}

fn not_found(id: DocId) -> AppError {
    AppError::NotFound(format!("post {id} not found"))
}

// ── Handlers ─────────────────────────────────────────────────────────

/// Public listing: hidden posts are never returned.
async fn list_posts(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<Post>>, AppError> {
    let params = visible_only(params_from_query(pairs));
    let query = translate(&params, &POST_FIELDS);
    Ok(Json(state.posts.list(&query).await?))
}

async fn search_posts(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Result<Json<Vec<Post>>, AppError> {
    let query = translate(&params, &POST_FIELDS);
    Ok(Json(state.posts.list(&query).await?))
}

async fn create_post(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<PostDraft>,
) -> Result<(StatusCode, Json<Post>), AppError> {
    draft.validate()?;
    let post = state.posts.create(draft).await?;
    Ok((StatusCode::CREATED, Json(post)))
}

async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
) -> Result<Json<Post>, AppError> {
    let post = state.posts.get(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(post))
}

async fn update_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
    Json(draft): Json<PostDraft>,
) -> Result<Json<Post>, AppError> {
    draft.validate()?;
    let post = state
        .posts
        .update(id, draft)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(post))
}

async fn delete_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
) -> Result<Json<Post>, AppError> {
    let post = state.posts.delete_one(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(post))
}

async fn set_display(
    State(state): State<Arc<AppState>>,
    Json(body): Json<DisplayRequest>,
) -> Result<Json<ModifiedResponse>, AppError> {
    let modified = state.posts.set_display(&body.ids, body.display).await?;
    Ok(Json(ModifiedResponse { modified }))
}

async fn delete_posts(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IdsRequest>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.posts.delete_many(&body.ids).await?;
    Ok(Json(DeletedResponse { deleted }))
}
