//! HTTP error types for `NodePress` server.
//!
//! Maps domain errors from `nodepress-core` into appropriate HTTP responses.
//! Every error variant produces a JSON body with a machine-readable `error`
//! field and a human-readable `message`; validation failures add a `fields`
//! map.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use nodepress_core::error::{MailError, MenuError, SettingsError, StoreError, UserError};
use nodepress_core::validation::ValidationErrors;

/// Application-level error returned from HTTP handlers.
#[derive(Debug)]
pub enum AppError {
    /// Requested resource not found.
    NotFound(String),
    /// Client sent invalid input.
    BadRequest(String),
    /// One or more fields failed validation.
    Validation(ValidationErrors),
    /// The request conflicts with existing data (e.g., a taken e-mail).
    Conflict(String),
    /// Internal server error.
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    fields: Option<ValidationErrors>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_type, message, fields) = match self {
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "validation_failed",
                errors.to_string(),
                Some(errors),
            ),
            Self::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    msg,
                    None,
                )
            }
        };

        let body = ErrorBody {
            error: error_type,
            message,
            fields,
        };

        (status, axum::Json(body)).into_response()
    }
}

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<MenuError> for AppError {
    fn from(err: MenuError) -> Self {
        match err {
            MenuError::Cycle { .. } => Self::BadRequest(err.to_string()),
            MenuError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<UserError> for AppError {
    fn from(err: UserError) -> Self {
        match err {
            UserError::EmailTaken { .. } => Self::Conflict(err.to_string()),
            UserError::Invalid(errors) => Self::Validation(errors),
            UserError::Store(_) | UserError::Password { .. } => Self::Internal(err.to_string()),
        }
    }
}

impl From<SettingsError> for AppError {
    fn from(err: SettingsError) -> Self {
        match err {
            SettingsError::Invalid(errors) => Self::Validation(errors),
            SettingsError::Store(_) => Self::Internal(err.to_string()),
        }
    }
}

impl From<MailError> for AppError {
    fn from(err: MailError) -> Self {
        Self::Internal(err.to_string())
    }
}
