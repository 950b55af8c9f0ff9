//! Creating and reading works and chapters on behalf of their owner.

use jugo_types::error::WorkError;
use jugo_types::work::{
    Chapter, CreateChapterRequest, CreateWorkRequest, MAX_TITLE_CHARS, NewChapter, NewWork, UserId,
    Work, WorkId,
};

use crate::repository::Page;
use crate::repository::work::{ChapterRepository, WorkRepository};

use super::text::count_words;

/// Work and chapter management generic over the repository ports.
pub struct WorkService<W, C> {
    works: W,
    chapters: C,
}

impl<W, C> WorkService<W, C>
where
    W: WorkRepository,
    C: ChapterRepository,
{
    pub fn new(works: W, chapters: C) -> Self {
        Self { works, chapters }
    }

    pub async fn create_work(
        &self,
        user_id: UserId,
        request: CreateWorkRequest,
    ) -> Result<Work, WorkError> {
        let title = validate_title(&request.title)?;
        let work = self
            .works
            .create(&NewWork {
                user_id,
                work_type: request.work_type,
                title,
            })
            .await?;

        tracing::info!(user_id = %user_id, work_id = %work.id, work_type = %work.work_type, "work created");
        Ok(work)
    }

    pub async fn list_works(&self, user_id: UserId, page: Page) -> Result<Vec<Work>, WorkError> {
        Ok(self.works.list_by_user(user_id, page).await?)
    }

    /// The work if `user_id` owns it.
    pub async fn get_work(&self, user_id: UserId, work_id: WorkId) -> Result<Work, WorkError> {
        let work = self
            .works
            .get_by_id(work_id)
            .await?
            .ok_or(WorkError::WorkNotFound)?;
        if work.user_id != user_id {
            return Err(WorkError::Forbidden);
        }
        Ok(work)
    }

    /// Add a chapter. Without an explicit order it goes after the last one.
    pub async fn create_chapter(
        &self,
        user_id: UserId,
        work_id: WorkId,
        request: CreateChapterRequest,
    ) -> Result<Chapter, WorkError> {
        let work = self.get_work(user_id, work_id).await?;
        let title = validate_title(&request.title)?;

        let order_num = match request.order {
            Some(order) if order < 1 => {
                return Err(WorkError::Validation("order must be at least 1".into()));
            }
            Some(order) => order,
            None => {
                let chapters = self.chapters.list_by_work(work.id).await?;
                chapters.iter().map(|c| c.order_num).max().unwrap_or(0) + 1
            }
        };

        let chapter = self
            .chapters
            .create(&NewChapter {
                work_id: work.id,
                words: count_words(&request.content),
                content: request.content,
                title,
                order_num,
            })
            .await?;

        tracing::debug!(work_id = %work.id, chapter_id = %chapter.id, order_num, "chapter created");
        Ok(chapter)
    }

    pub async fn list_chapters(
        &self,
        user_id: UserId,
        work_id: WorkId,
    ) -> Result<Vec<Chapter>, WorkError> {
        let work = self.get_work(user_id, work_id).await?;
        Ok(self.chapters.list_by_work(work.id).await?)
    }
}

fn validate_title(title: &str) -> Result<String, WorkError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(WorkError::Validation("title must not be empty".into()));
    }
    if title.chars().count() > MAX_TITLE_CHARS {
        return Err(WorkError::Validation(format!(
            "title must be at most {MAX_TITLE_CHARS} characters"
        )));
    }
    Ok(title.to_string())
}
