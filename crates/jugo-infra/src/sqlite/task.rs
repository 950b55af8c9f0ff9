//! SQLite task repository.
//!
//! Every status change is guarded by `status IN ('pending', 'processing')`
//! so terminal rows are immutable.

use chrono::Utc;
use sqlx::Row;

use jugo_core::repository::Page;
use jugo_core::repository::task::TaskRepository;
use jugo_types::error::RepositoryError;
use jugo_types::task::{Task, TaskId, TaskKind, TaskStatus};
use jugo_types::work::{UserId, WorkId};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

const OPEN: &str = "status IN ('pending', 'processing')";

/// SQLite-backed implementation of `TaskRepository`.
pub struct SqliteTaskRepository {
    pool: DatabasePool,
}

impl SqliteTaskRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct TaskRow {
    id: String,
    user_id: i64,
    work_id: i64,
    kind: String,
    status: String,
    progress: i64,
    parameters: String,
    result: Option<String>,
    error: Option<String>,
    created_at: String,
    updated_at: String,
    completed_at: Option<String>,
}

impl TaskRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            work_id: row.try_get("work_id")?,
            kind: row.try_get("kind")?,
            status: row.try_get("status")?,
            progress: row.try_get("progress")?,
            parameters: row.try_get("parameters")?,
            result: row.try_get("result")?,
            error: row.try_get("error")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
            completed_at: row.try_get("completed_at")?,
        })
    }

    fn into_task(self) -> Result<Task, RepositoryError> {
        let id = self
            .id
            .parse::<TaskId>()
            .map_err(|e| RepositoryError::Query(format!("invalid task id: {e}")))?;
        let kind: TaskKind = self.kind.parse().map_err(|e: String| RepositoryError::Query(e))?;
        let status: TaskStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let parameters = serde_json::from_str(&self.parameters)
            .map_err(|e| RepositoryError::Query(format!("invalid parameters JSON: {e}")))?;

        Ok(Task {
            id,
            user_id: UserId(self.user_id),
            work_id: WorkId(self.work_id),
            kind,
            status,
            progress: self.progress.clamp(0, 100) as u8,
            parameters,
            result: self.result,
            error: self.error,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
            completed_at: self.completed_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

impl TaskRepository for SqliteTaskRepository {
    async fn create(&self, task: &Task) -> Result<(), RepositoryError> {
        let parameters =
            serde_json::to_string(&task.parameters).map_err(|e| RepositoryError::Query(e.to_string()))?;

        let result = sqlx::query(
            "INSERT INTO ai_tasks (id, user_id, work_id, kind, status, progress, parameters, result, error, created_at, updated_at, completed_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(task.id.to_string())
        .bind(task.user_id.0)
        .bind(task.work_id.0)
        .bind(task.kind.to_string())
        .bind(task.status.to_string())
        .bind(i64::from(task.progress))
        .bind(&parameters)
        .bind(&task.result)
        .bind(&task.error)
        .bind(format_datetime(&task.created_at))
        .bind(format_datetime(&task.updated_at))
        .bind(task.completed_at.as_ref().map(format_datetime))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(_) => Ok(()),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("UNIQUE") => {
                Err(RepositoryError::Conflict(format!("task '{}' already exists", task.id)))
            }
            Err(e) => Err(query_error(e)),
        }
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        // Reads go to the writer: the dispatcher reads back its own updates.
        let row = sqlx::query("SELECT * FROM ai_tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool.writer)
            .await
            .map_err(query_error)?;

        row.map(|row| TaskRow::from_row(&row).map_err(query_error)?.into_task())
            .transpose()
    }

    async fn list_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Task>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM ai_tasks WHERE user_id = ? ORDER BY created_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id.0)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| TaskRow::from_row(row).map_err(query_error)?.into_task())
            .collect()
    }

    async fn mark_processing(&self, id: &TaskId, progress: u8) -> Result<bool, RepositoryError> {
        let sql = format!(
            "UPDATE ai_tasks SET status = 'processing', progress = MAX(progress, ?), updated_at = ? WHERE id = ? AND {OPEN}"
        );
        let result = sqlx::query(&sql)
            .bind(i64::from(progress.min(100)))
            .bind(format_datetime(&Utc::now()))
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn complete(&self, id: &TaskId, result: &str) -> Result<bool, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let sql = format!(
            "UPDATE ai_tasks SET status = 'completed', progress = 100, result = ?, updated_at = ?, completed_at = ? WHERE id = ? AND {OPEN}"
        );
        let updated = sqlx::query(&sql)
            .bind(result)
            .bind(&now)
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(updated.rows_affected() > 0)
    }

    async fn fail(&self, id: &TaskId, error: &str) -> Result<bool, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let sql = format!(
            "UPDATE ai_tasks SET status = 'failed', error = ?, updated_at = ?, completed_at = ? WHERE id = ? AND {OPEN}"
        );
        let result = sqlx::query(&sql)
            .bind(error)
            .bind(&now)
            .bind(&now)
            .bind(id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected() > 0)
    }

    async fn fail_unfinished(&self, error: &str) -> Result<u64, RepositoryError> {
        let now = format_datetime(&Utc::now());
        let sql = format!(
            "UPDATE ai_tasks SET status = 'failed', error = ?, updated_at = ?, completed_at = ? WHERE {OPEN}"
        );
        let result = sqlx::query(&sql)
            .bind(error)
            .bind(&now)
            .bind(&now)
            .execute(&self.pool.writer)
            .await
            .map_err(query_error)?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::pool::tests::{seed_work, test_pool};

    async fn setup() -> (SqliteTaskRepository, i64) {
        let pool = test_pool().await;
        let work_id = seed_work(&pool, 1, "novel").await;
        (SqliteTaskRepository::new(pool), work_id)
    }

    fn pending(work_id: i64) -> Task {
        Task::pending(
            UserId(1),
            WorkId(work_id),
            TaskKind::Continue,
            serde_json::json!({"workId": work_id, "length": 500}),
        )
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let (repo, work_id) = setup().await;
        let task = pending(work_id);
        repo.create(&task).await.unwrap();

        let stored = repo.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.id, task.id);
        assert_eq!(stored.kind, TaskKind::Continue);
        assert_eq!(stored.status, TaskStatus::Pending);
        assert_eq!(stored.progress, 0);
        assert_eq!(stored.parameters["length"], 500);
        assert!(stored.completed_at.is_none());

        assert!(matches!(repo.create(&task).await, Err(RepositoryError::Conflict(_))));
        assert!(repo.get(&TaskId::new()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_progress_never_decreases() {
        let (repo, work_id) = setup().await;
        let task = pending(work_id);
        repo.create(&task).await.unwrap();

        assert!(repo.mark_processing(&task.id, 30).await.unwrap());
        assert!(repo.mark_processing(&task.id, 10).await.unwrap());
        let stored = repo.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Processing);
        assert_eq!(stored.progress, 30);
    }

    #[tokio::test]
    async fn test_complete_is_terminal() {
        let (repo, work_id) = setup().await;
        let task = pending(work_id);
        repo.create(&task).await.unwrap();

        assert!(repo.complete(&task.id, "The end.").await.unwrap());
        let stored = repo.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.progress, 100);
        assert_eq!(stored.result.as_deref(), Some("The end."));
        assert!(stored.completed_at.is_some());

        assert!(!repo.fail(&task.id, "late").await.unwrap());
        assert!(!repo.mark_processing(&task.id, 90).await.unwrap());
        assert_eq!(repo.get(&task.id).await.unwrap().unwrap().status, TaskStatus::Completed);
    }

    #[tokio::test]
    async fn test_fail_keeps_progress() {
        let (repo, work_id) = setup().await;
        let task = pending(work_id);
        repo.create(&task).await.unwrap();
        repo.mark_processing(&task.id, 30).await.unwrap();

        assert!(repo.fail(&task.id, "provider error: boom").await.unwrap());
        let stored = repo.get(&task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.progress, 30);
        assert_eq!(stored.error.as_deref(), Some("provider error: boom"));
        assert!(stored.completed_at.is_some());
        assert!(!repo.complete(&task.id, "too late").await.unwrap());
    }

    #[tokio::test]
    async fn test_list_by_user_newest_first() {
        let (repo, work_id) = setup().await;
        let mut ids = Vec::new();
        for _ in 0..3 {
            let task = pending(work_id);
            repo.create(&task).await.unwrap();
            ids.push(task.id);
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }

        let listed = repo.list_by_user(UserId(1), Page::new(Some(2), None)).await.unwrap();
        assert_eq!(listed.iter().map(|t| t.id).collect::<Vec<_>>(), vec![ids[2], ids[1]]);

        let rest = repo.list_by_user(UserId(1), Page::new(Some(2), Some(2))).await.unwrap();
        assert_eq!(rest.len(), 1);
        assert!(repo.list_by_user(UserId(2), Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fail_unfinished() {
        let (repo, work_id) = setup().await;
        let waiting = pending(work_id);
        let running = pending(work_id);
        let done = pending(work_id);
        for task in [&waiting, &running, &done] {
            repo.create(task).await.unwrap();
        }
        repo.mark_processing(&running.id, 30).await.unwrap();
        repo.complete(&done.id, "ok").await.unwrap();

        assert_eq!(repo.fail_unfinished("interrupted").await.unwrap(), 2);
        assert_eq!(repo.get(&waiting.id).await.unwrap().unwrap().status, TaskStatus::Failed);
        assert_eq!(repo.get(&running.id).await.unwrap().unwrap().progress, 30);
        assert_eq!(repo.get(&done.id).await.unwrap().unwrap().status, TaskStatus::Completed);
    }
}
