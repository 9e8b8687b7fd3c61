use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::coordinator::CoordinatorError;

/// Unified application error type that maps to JSON HTTP responses.
///
/// Error format: `{ "error": { "code": "...", "message": "..." } }`.
#[derive(Debug)]
pub enum AppError {
    /// 400 Bad Request
    BadRequest(String),
    /// 404 Not Found
    NotFound(String),
    /// Coordinator rejection; status and code follow the error kind
    Game(CoordinatorError),
    /// 500 Internal Server Error (wraps any error, logs details, returns generic message)
    Internal(anyhow::Error),
}

impl AppError {
    /// HTTP status for a coordinator error.
    #[must_use]
    pub const fn status_of(err: &CoordinatorError) -> StatusCode {
        match err {
            CoordinatorError::RoomNotFound(_) | CoordinatorError::PlayerNotFound(_) => {
                StatusCode::NOT_FOUND
            }
            CoordinatorError::RoomFull { .. }
            | CoordinatorError::WrongPhase { .. }
            | CoordinatorError::PlayerNotAlive(_) => StatusCode::CONFLICT,
            CoordinatorError::RoleMismatch { .. } | CoordinatorError::NotHost => {
                StatusCode::FORBIDDEN
            }
            CoordinatorError::InsufficientPlayers { .. }
            | CoordinatorError::InvalidUsername(_) => StatusCode::UNPROCESSABLE_ENTITY,
            CoordinatorError::Directory(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match self {
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            Self::Game(CoordinatorError::Directory(err)) | Self::Internal(err) => {
                tracing::error!("Internal server error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
            Self::Game(err) => (Self::status_of(&err), err.code(), err.to_string()),
        };

        (
            status,
            Json(json!({
                "error": {
                    "code": code,
                    "message": message,
                }
            })),
        )
            .into_response()
    }
}

impl From<CoordinatorError> for AppError {
    fn from(err: CoordinatorError) -> Self {
        Self::Game(err)
    }
}

impl From<sea_orm::DbErr> for AppError {
    fn from(err: sea_orm::DbErr) -> Self {
        Self::Internal(err.into())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}
