use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::report::ReportError;
use crate::storage::StoreError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// Carries the sign-in route the client should follow.
    #[error("Unauthorized")]
    Unauthorized { sign_in: String },

    /// A stage of the upload/analysis flow failed. `reason` is the
    /// user-facing status line; `status_log` is the progress up to and
    /// including the failure.
    #[error("Analysis failed: {reason}")]
    Analysis {
        reason: String,
        status_log: Vec<String>,
    },

    #[error("Storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Report error: {0}")]
    Report(#[from] ReportError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    pub fn unauthorized(requested_path: &str) -> Self {
        AppError::Unauthorized {
            sign_in: format!("/auth?next={requested_path}"),
        }
    }

    /// The status line shown for a failed analysis stage.
    pub fn analysis_message(reason: &str) -> String {
        format!("Error: {reason}. Please try again.")
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
            AppError::Unauthorized { sign_in } => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                format!("Authentication required; sign in via {sign_in}"),
            ),
            AppError::Analysis { reason, .. } => {
                tracing::error!("Analysis error: {reason}");
                (
                    StatusCode::BAD_GATEWAY,
                    "ANALYSIS_FAILED",
                    AppError::analysis_message(reason),
                )
            }
            AppError::Storage(StoreError::NotFound(path)) => (
                StatusCode::NOT_FOUND,
                "NOT_FOUND",
                format!("File {path} not found"),
            ),
            AppError::Storage(StoreError::InvalidPath(path)) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                format!("Invalid path '{path}'"),
            ),
            AppError::Storage(e) => {
                tracing::error!("Storage error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "STORAGE_ERROR",
                    "A storage error occurred".to_string(),
                )
            }
            AppError::Report(e) => {
                tracing::error!("Report error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "REPORT_ERROR",
                    "The report could not be generated".to_string(),
                )
            }
            AppError::Internal(e) => {
                tracing::error!("Internal error: {e:?}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal server error occurred".to_string(),
                )
            }
        };

        let mut body = json!({
            "error": {
                "code": code,
                "message": message
            }
        });
        if let AppError::Analysis { status_log, .. } = self {
            body["error"]["status_log"] = json!(status_log);
        }

        (status, Json(body)).into_response()
    }
}
