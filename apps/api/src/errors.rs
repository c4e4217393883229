use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::document::template::TemplateError;
use crate::document::ContainerError;
use crate::llm_client::LlmError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] redis::RedisError),

    #[error("Internal server error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Database(e) => {
                tracing::error!("Database error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "DATABASE_ERROR",
                    "A database error occurred".to_string(),
                )
            }
            AppError::Queue(e) => {
                tracing::error!("Queue error: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "QUEUE_ERROR",
                    "The job could not be scheduled".to_string(),
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

        let body = Json(json!({
            "error": {
                "code": code,
                "message": message
            }
        }));

        (status, body).into_response()
    }
}

/// Everything that can end a rewrite job. The `Display` text is what gets
/// written to the record's `error_message`, so keep it human-readable.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A record, its parent, or the document bytes are absent.
    #[error("{0}")]
    InputMissing(&'static str),

    /// The document holds nothing that can be rewritten.
    #[error("{0}")]
    NoContent(String),

    #[error("{0}")]
    Generation(#[from] LlmError),

    /// The stream completed without a usable final value.
    #[error("{0}")]
    NoOutput(String),

    #[error("Rewrite failed validation after retry: {}", .issues.join("; "))]
    ValidationFailed { issues: Vec<String> },

    #[error("{0}")]
    Container(#[from] ContainerError),

    #[error("Template error: {0}")]
    Template(#[from] TemplateError),

    #[error("{0:#}")]
    Store(#[from] anyhow::Error),
}
