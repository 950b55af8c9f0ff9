use thiserror::Error;

use crate::work::WorkType;

/// Errors from repository operations (used by trait definitions in jugo-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors related to generation task submission and lookup.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("work not found")]
    WorkNotFound,

    #[error("task not found")]
    TaskNotFound,

    #[error("not the owner of this resource")]
    Forbidden,

    #[error("work type mismatch: expected {expected}, got {actual}")]
    WorkTypeMismatch {
        expected: WorkType,
        actual: WorkType,
    },

    #[error("generation queue is full, try again later")]
    Overloaded,

    #[error("task already finished")]
    AlreadyFinished,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for TaskError {
    fn from(e: RepositoryError) -> Self {
        TaskError::Storage(e.to_string())
    }
}

/// Errors related to saving manuscript content.
#[derive(Debug, Error)]
pub enum SaveError {
    #[error("work not found")]
    WorkNotFound,

    #[error("chapter not found")]
    ChapterNotFound,

    #[error("not the owner of this work")]
    Forbidden,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for SaveError {
    fn from(e: RepositoryError) -> Self {
        SaveError::Storage(e.to_string())
    }
}

/// Errors from creating and reading works and chapters.
#[derive(Debug, Error)]
pub enum WorkError {
    #[error("invalid request: {0}")]
    Validation(String),

    #[error("work not found")]
    WorkNotFound,

    #[error("not the owner of this work")]
    Forbidden,

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for WorkError {
    fn from(e: RepositoryError) -> Self {
        WorkError::Storage(e.to_string())
    }
}

/// Errors from credential verification.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing credential")]
    Missing,

    #[error("invalid credential")]
    Invalid,

    #[error("credential store error: {0}")]
    Storage(String),
}

impl From<RepositoryError> for AuthError {
    fn from(e: RepositoryError) -> Self {
        AuthError::Storage(e.to_string())
    }
}
