//! Settings routes: `/v1/settings` and `/v1/setup/status`.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use serde_json::Value;

use nodepress_core::settings::Settings;

use crate::error::AppError;
use crate::state::AppState;

/// Build the settings and setup-status router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/v1/settings", get(get_settings).put(update_settings))
        .route("/v1/setup/status", get(setup_status))
}

#[derive(Debug, Serialize)]
pub struct SetupStatusResponse {
    pub configured: bool,
}

/// Stored settings, or the defaults before first configuration.
async fn get_settings(State(state): State<Arc<AppState>>) -> Result<Json<Settings>, AppError> {
    Ok(Json(state.settings.get_or_default().await?))
}

/// Merge a partial settings object over the stored settings.
async fn update_settings(
    State(state): State<Arc<AppState>>,
    Json(patch): Json<Value>,
) -> Result<Json<Settings>, AppError> {
    Ok(Json(state.settings.update(patch).await?))
}

async fn setup_status(
    State(state): State<Arc<AppState>>,
) -> Result<Json<SetupStatusResponse>, AppError> {
    let configured = state.settings.is_configured().await?;
    Ok(Json(SetupStatusResponse { configured }))
}
