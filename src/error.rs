use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// Error returned by every handler; renders as `{ "error": ..., "details": ... }`.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("validation failed")]
    Validation(Vec<String>),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("authentication required")]
    Unauthorized(String),

    #[error("invalid or expired token")]
    InvalidToken,

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) | AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) | AppError::InvalidToken => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

const UNIQUE_VIOLATION: &str = "23505";

/// True when `err` wraps a Postgres unique-key violation.
fn is_unique_violation(err: &anyhow::Error) -> bool {
    match err.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db.code().as_deref() == Some(UNIQUE_VIOLATION),
        _ => false,
    }
}

impl AppError {
    /// 409 with `message` for a unique-key violation, 500 for anything else.
    pub fn conflict_on_unique(err: anyhow::Error, message: &str) -> Self {
        if is_unique_violation(&err) {
            AppError::Conflict(message.into())
        } else {
            AppError::Internal(err)
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let (error, details) = match self {
            AppError::Validation(messages) => ("validation_error", Some(serde_json::json!(messages))),
            AppError::BadRequest(msg) => ("bad_request", Some(msg.into())),
            AppError::Unauthorized(msg) => ("unauthorized", Some(msg.into())),
            AppError::InvalidToken => ("invalid_token", None),
            AppError::Forbidden(msg) => ("forbidden", Some(msg.into())),
            AppError::NotFound(msg) => ("not_found", Some(msg.into())),
            AppError::Conflict(msg) => ("conflict", Some(msg.into())),
            AppError::Internal(e) => {
                error!(error = %format!("{e:#}"), "internal error");
                ("internal_error", None)
            }
        };
        (status, Json(ErrorBody { error, details })).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
