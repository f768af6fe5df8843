//! User routes: `/v1/users/*`
//!
//! Responses always use the password-free user view.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;
use tracing::warn;

use nodepress_core::id::DocId;
use nodepress_core::query::{params_from_query, translate};
use nodepress_core::user::{USER_FIELDS, User, UserDraft, UserUpdate, UserView};

use super::{DeletedResponse, IdsRequest, ModifiedResponse};
use crate::error::AppError;
use crate::state::AppState;

/// Build the `/v1/users` router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_users).post(create_user).delete(delete_users))
        .route("/search", post(search_users))
        .route("/active", put(set_active))
        .route("/{id}", get(get_user).put(update_user).delete(delete_user))
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub ids: Vec<DocId>,
    pub active: bool,
}

fn not_found(id: DocId) -> AppError {
    AppError::NotFound(format!("user {id} not found"))
}

fn views(users: &[User]) -> Vec<UserView> {
    users.iter().map(User::view).collect()
}

// ── Handlers ─────────────────────────────────────────────────────────

async fn list_users(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<Vec<(String, String)>>,
) -> Result<Json<Vec<UserView>>, AppError> {
    let query = translate(&params_from_query(pairs), &USER_FIELDS);
    Ok(Json(views(&state.users.list(&query).await?)))
}

async fn search_users(
    State(state): State<Arc<AppState>>,
    Json(params): Json<Value>,
) -> Result<Json<Vec<UserView>>, AppError> {
    let query = translate(&params, &USER_FIELDS);
    Ok(Json(views(&state.users.list(&query).await?)))
}

async fn create_user(
    State(state): State<Arc<AppState>>,
    Json(draft): Json<UserDraft>,
) -> Result<(StatusCode, Json<UserView>), AppError> {
    let user = state.users.create(draft).await?;
    Ok((StatusCode::CREATED, Json(user.view())))
}

async fn get_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
) -> Result<Json<UserView>, AppError> {
    let user = state.users.get(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(user.view()))
}

async fn update_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
    Json(update): Json<UserUpdate>,
) -> Result<Json<UserView>, AppError> {
    let user = state
        .users
        .update(id, update)
        .await?
        .ok_or_else(|| not_found(id))?;
    Ok(Json(user.view()))
}

async fn delete_user(
    State(state): State<Arc<AppState>>,
    Path(id): Path<DocId>,
) -> Result<Json<UserView>, AppError> {
    let user = state.users.delete_one(id).await?.ok_or_else(|| not_found(id))?;
    Ok(Json(user.view()))
}

/// Activate or deactivate accounts and notify each changed account by mail.
///
/// Mail failures are logged and do not fail the request.
async fn set_active(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ActiveRequest>,
) -> Result<Json<ModifiedResponse>, AppError> {
    let changed = state.users.set_active(&body.ids, body.active).await?;
    for user in &changed {
        if let Err(e) = state
            .mailer
            .send_account_status_email(&user.email, body.active)
            .await
        {
            warn!(id = %user.id, error = %e, "failed to send account status mail");
        }
    }
    Ok(Json(ModifiedResponse {
        modified: changed.len(),
    }))
}

async fn delete_users(
    State(state): State<Arc<AppState>>,
    Json(body): Json<IdsRequest>,
) -> Result<Json<DeletedResponse>, AppError> {
    let deleted = state.users.delete_many(&body.ids).await?;
    Ok(Json(DeletedResponse { deleted }))
}
