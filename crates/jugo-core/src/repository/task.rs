//! Task store trait definition.

use jugo_types::error::RepositoryError;
use jugo_types::task::{Task, TaskId};
use jugo_types::work::UserId;

use super::Page;

/// Persistence for generation tasks.
///
/// The status-changing methods only touch tasks that are not yet terminal and
/// report whether a row changed, so a cancelled task can never be flipped back
/// to `processing` or `completed` by a job that is still unwinding.
pub trait TaskRepository: Send + Sync {
    /// Insert a new task.
    fn create(
        &self,
        task: &Task,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// Get a task by id.
    fn get(
        &self,
        id: &TaskId,
    ) -> impl std::future::Future<Output = Result<Option<Task>, RepositoryError>> + Send;

    /// Most recent tasks of one user, newest first.
    fn list_by_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> impl std::future::Future<Output = Result<Vec<Task>, RepositoryError>> + Send;

    /// Move to `processing` and raise progress. Progress never decreases.
    fn mark_processing(
        &self,
        id: &TaskId,
        progress: u8,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Store the result, set progress to 100, and stamp `completed_at`.
    fn complete(
        &self,
        id: &TaskId,
        result: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Store the error and stamp `completed_at`. Progress is left as-is.
    fn fail(
        &self,
        id: &TaskId,
        error: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Fail every task still `pending` or `processing`. Used at startup for
    /// jobs whose process died. Returns the number of tasks changed.
    fn fail_unfinished(
        &self,
        error: &str,
    ) -> impl std::future::Future<Output = Result<u64, RepositoryError>> + Send;
}
