//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use jugo_types::error::{AuthError, SaveError, TaskError, WorkError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Task(TaskError),
    Save(SaveError),
    Work(WorkError),
    Auth(AuthError),
    Validation(String),
    NotFound(String),
    Internal(String),
}

impl From<TaskError> for AppError {
    fn from(e: TaskError) -> Self {
        AppError::Task(e)
    }
}

impl From<SaveError> for AppError {
    fn from(e: SaveError) -> Self {
        AppError::Save(e)
    }
}

impl From<WorkError> for AppError {
    fn from(e: WorkError) -> Self {
        AppError::Work(e)
    }
}

impl From<AuthError> for AppError {
    fn from(e: AuthError) -> Self {
        AppError::Auth(e)
    }
}

impl AppError {
    /// Status, machine-readable code and message for the envelope.
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Task(TaskError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Task(e @ TaskError::WorkTypeMismatch { .. }) => {
                (StatusCode::BAD_REQUEST, "WORK_TYPE_MISMATCH", e.to_string())
            }
            AppError::Task(TaskError::WorkNotFound) => {
                (StatusCode::NOT_FOUND, "WORK_NOT_FOUND", "Work not found".to_string())
            }
            AppError::Task(TaskError::TaskNotFound) => {
                (StatusCode::NOT_FOUND, "TASK_NOT_FOUND", "Task not found".to_string())
            }
            AppError::Task(TaskError::Forbidden)
            | AppError::Save(SaveError::Forbidden)
            | AppError::Work(WorkError::Forbidden) => (
                StatusCode::FORBIDDEN,
                "FORBIDDEN",
                "Not the owner of this resource".to_string(),
            ),
            AppError::Task(e @ TaskError::Overloaded) => {
                (StatusCode::SERVICE_UNAVAILABLE, "OVERLOADED", e.to_string())
            }
            AppError::Task(e @ TaskError::AlreadyFinished) => {
                (StatusCode::CONFLICT, "TASK_FINISHED", e.to_string())
            }
            AppError::Task(e @ TaskError::Storage(_)) => {
                tracing::error!(error = %e, "task storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
            }
            AppError::Save(SaveError::WorkNotFound) => {
                (StatusCode::NOT_FOUND, "WORK_NOT_FOUND", "Work not found".to_string())
            }
            AppError::Save(SaveError::ChapterNotFound) => {
                (StatusCode::NOT_FOUND, "CHAPTER_NOT_FOUND", "Chapter not found".to_string())
            }
            AppError::Save(e @ SaveError::Storage(_)) => {
                tracing::error!(error = %e, "save storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
            }
            AppError::Work(WorkError::Validation(msg)) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone())
            }
            AppError::Work(WorkError::WorkNotFound) => {
                (StatusCode::NOT_FOUND, "WORK_NOT_FOUND", "Work not found".to_string())
            }
            AppError::Work(e @ WorkError::Storage(_)) => {
                tracing::error!(error = %e, "work storage failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string())
            }
            AppError::Auth(AuthError::Missing) => (
                StatusCode::UNAUTHORIZED,
                "UNAUTHORIZED",
                "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
            ),
            AppError::Auth(AuthError::Invalid) => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Invalid API key".to_string())
            }
            AppError::Auth(e @ AuthError::Storage(_)) => {
                tracing::error!(error = %e, "credential lookup failure");
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", e.to_string())
            }
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg.clone())
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();

        let body = json!({
            "data": null,
            "meta": {
                "request_id": uuid::Uuid::now_v7().to_string(),
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
