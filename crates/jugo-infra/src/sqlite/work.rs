//! SQLite work and chapter repositories.

use chrono::Utc;
use sqlx::{Row, SqliteConnection};

use jugo_core::repository::Page;
use jugo_core::repository::work::{ChapterRepository, WorkRepository};
use jugo_types::error::RepositoryError;
use jugo_types::work::{Chapter, ChapterId, NewChapter, NewWork, UserId, Work, WorkId, WorkType};

use super::pool::DatabasePool;
use super::{format_datetime, parse_datetime, query_error};

/// SQLite-backed implementation of `WorkRepository`.
pub struct SqliteWorkRepository {
    pool: DatabasePool,
}

impl SqliteWorkRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct WorkRow {
    id: i64,
    user_id: i64,
    work_type: String,
    title: String,
    words: i64,
    num_chapters: i64,
    created_at: String,
    updated_at: String,
}

impl WorkRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            work_type: row.try_get("type")?,
            title: row.try_get("title")?,
            words: row.try_get("words")?,
            num_chapters: row.try_get("num_chapters")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_work(self) -> Result<Work, RepositoryError> {
        let work_type: WorkType = self
            .work_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;

        Ok(Work {
            id: WorkId(self.id),
            user_id: UserId(self.user_id),
            work_type,
            title: self.title,
            words: self.words,
            num_chapters: self.num_chapters,
            created_at: parse_datetime(&self.created_at)?,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

impl WorkRepository for SqliteWorkRepository {
    async fn create(&self, work: &NewWork) -> Result<Work, RepositoryError> {
        let now = Utc::now();
        let result = sqlx::query(
            "INSERT INTO works (user_id, type, title, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(work.user_id.0)
        .bind(work.work_type.to_string())
        .bind(&work.title)
        .bind(format_datetime(&now))
        .bind(format_datetime(&now))
        .execute(&self.pool.writer)
        .await;

        match result {
            Ok(done) => Ok(Work {
                id: WorkId(done.last_insert_rowid()),
                user_id: work.user_id,
                work_type: work.work_type,
                title: work.title.clone(),
                words: 0,
                num_chapters: 0,
                created_at: now,
                updated_at: now,
            }),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("FOREIGN KEY") => {
                Err(RepositoryError::NotFound)
            }
            Err(e) => Err(query_error(e)),
        }
    }

    async fn get_by_id(&self, id: WorkId) -> Result<Option<Work>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM works WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.map(|row| WorkRow::from_row(&row).map_err(query_error)?.into_work())
            .transpose()
    }

    async fn list_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Work>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM works WHERE user_id = ? ORDER BY updated_at DESC, id DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id.0)
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(query_error)?;

        rows.iter()
            .map(|row| WorkRow::from_row(row).map_err(query_error)?.into_work())
            .collect()
    }
}

/// SQLite-backed implementation of `ChapterRepository`.
pub struct SqliteChapterRepository {
    pool: DatabasePool,
}

impl SqliteChapterRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct ChapterRow {
    id: i64,
    work_id: i64,
    title: String,
    content: String,
    words: i64,
    order_num: i64,
    updated_at: String,
}

impl ChapterRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            work_id: row.try_get("work_id")?,
            title: row.try_get("title")?,
            content: row.try_get("content")?,
            words: row.try_get("words")?,
            order_num: row.try_get("order_num")?,
            updated_at: row.try_get("updated_at")?,
        })
    }

    fn into_chapter(self) -> Result<Chapter, RepositoryError> {
        Ok(Chapter {
            id: ChapterId(self.id),
            work_id: WorkId(self.work_id),
            title: self.title,
            content: self.content,
            words: self.words,
            order_num: self.order_num,
            updated_at: parse_datetime(&self.updated_at)?,
        })
    }
}

/// Recompute a work's word and chapter totals from its chapters.
async fn refresh_totals(conn: &mut SqliteConnection, work_id: i64) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE works SET
            words = (SELECT COALESCE(SUM(words), 0) FROM chapters WHERE work_id = ?),
            num_chapters = (SELECT COUNT(*) FROM chapters WHERE work_id = ?),
            updated_at = ?
         WHERE id = ?",
    )
    .bind(work_id)
    .bind(work_id)
    .bind(format_datetime(&Utc::now()))
    .bind(work_id)
    .execute(conn)
    .await?;
    Ok(())
}

impl ChapterRepository for SqliteChapterRepository {
    async fn create(&self, chapter: &NewChapter) -> Result<Chapter, RepositoryError> {
        let now = Utc::now();
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let result = sqlx::query(
            "INSERT INTO chapters (work_id, title, content, words, order_num, updated_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(chapter.work_id.0)
        .bind(&chapter.title)
        .bind(&chapter.content)
        .bind(chapter.words)
        .bind(chapter.order_num)
        .bind(format_datetime(&now))
        .execute(&mut *tx)
        .await;

        let id = match result {
            Ok(done) => done.last_insert_rowid(),
            Err(sqlx::Error::Database(db_err)) if db_err.message().contains("FOREIGN KEY") => {
                return Err(RepositoryError::NotFound);
            }
            Err(e) => return Err(query_error(e)),
        };

        refresh_totals(&mut *tx, chapter.work_id.0)
            .await
            .map_err(query_error)?;
        tx.commit().await.map_err(query_error)?;

        Ok(Chapter {
            id: ChapterId(id),
            work_id: chapter.work_id,
            title: chapter.title.clone(),
            content: chapter.content.clone(),
            words: chapter.words,
            order_num: chapter.order_num,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: ChapterId) -> Result<Option<Chapter>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chapters WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(query_error)?;

        row.map(|row| ChapterRow::from_row(&row).map_err(query_error)?.into_chapter())
            .transpose()
    }

    async fn list_by_work(&self, work_id: WorkId) -> Result<Vec<Chapter>, RepositoryError> {
        let rows = sqlx::query("SELECT * FROM chapters WHERE work_id = ? ORDER BY order_num, id")
            .bind(work_id.0)
            .fetch_all(&self.pool.reader)
            .await
            .map_err(query_error)?;

        rows.iter()
            .map(|row| ChapterRow::from_row(row).map_err(query_error)?.into_chapter())
            .collect()
    }

    async fn save_content(
        &self,
        id: ChapterId,
        content: &str,
        words: i64,
    ) -> Result<(), RepositoryError> {
        // Dropping `tx` on any early return rolls the chapter update back.
        let mut tx = self.pool.writer.begin().await.map_err(query_error)?;

        let work_id: Option<i64> = sqlx::query_scalar("SELECT work_id FROM chapters WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&mut *tx)
            .await
            .map_err(query_error)?;
        let Some(work_id) = work_id else {
            return Err(RepositoryError::NotFound);
        };

        sqlx::query("UPDATE chapters SET content = ?, words = ?, updated_at = ? WHERE id = ?")
            .bind(content)
            .bind(words)
            .bind(format_datetime(&Utc::now()))
            .bind(id.0)
            .execute(&mut *tx)
            .await
            .map_err(query_error)?;

        refresh_totals(&mut *tx, work_id).await.map_err(query_error)?;
        tx.commit().await.map_err(query_error)?;
        Ok(())
    }
}
