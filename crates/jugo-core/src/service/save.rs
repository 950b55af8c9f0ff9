//! Chapter saving shared by realtime autosave and the manual save endpoint.

use chrono::Utc;

use jugo_types::error::SaveError;
use jugo_types::work::{ChapterId, SaveOutcome, UserId, WorkId};

use crate::repository::work::{ChapterRepository, WorkRepository};

use super::text::count_words;

/// One save of a chapter's full content.
#[derive(Debug, Clone)]
pub struct SaveCommand {
    pub user_id: UserId,
    pub work_id: WorkId,
    pub chapter_id: ChapterId,
    pub content: String,
    /// Client-side edit time as sent by the editor, if any.
    pub client_timestamp: Option<String>,
}

/// Persists manuscript content on behalf of a caller.
pub trait SaveService: Send + Sync {
    fn save(
        &self,
        command: SaveCommand,
    ) -> impl std::future::Future<Output = Result<SaveOutcome, SaveError>> + Send;
}

/// [`SaveService`] over the work and chapter repositories.
///
/// Checks that the caller owns the work and that the chapter belongs to it,
/// then writes the content with its word count. The chapter and the work
/// totals change in one repository write, so a failed save leaves both as
/// they were.
pub struct ChapterSaveService<W, C> {
    works: W,
    chapters: C,
}

impl<W, C> ChapterSaveService<W, C>
where
    W: WorkRepository,
    C: ChapterRepository,
{
    pub fn new(works: W, chapters: C) -> Self {
        Self { works, chapters }
    }
}

impl<W, C> SaveService for ChapterSaveService<W, C>
where
    W: WorkRepository,
    C: ChapterRepository,
{
    async fn save(&self, command: SaveCommand) -> Result<SaveOutcome, SaveError> {
        let work = self
            .works
            .get_by_id(command.work_id)
            .await?
            .ok_or(SaveError::WorkNotFound)?;
        if work.user_id != command.user_id {
            return Err(SaveError::Forbidden);
        }

        let chapter = self
            .chapters
            .get_by_id(command.chapter_id)
            .await?
            .filter(|c| c.work_id == work.id)
            .ok_or(SaveError::ChapterNotFound)?;

        let words = count_words(&command.content);
        self.chapters
            .save_content(chapter.id, &command.content, words)
            .await?;

        tracing::debug!(
            work_id = %work.id,
            chapter_id = %chapter.id,
            words,
            client_timestamp = command.client_timestamp.as_deref().unwrap_or(""),
            "chapter saved"
        );

        Ok(SaveOutcome {
            saved_at: Utc::now(),
            words,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MemoryStore;
    use jugo_types::work::WorkType;

    fn command(user: i64, work: i64, chapter: i64, content: &str) -> SaveCommand {
        SaveCommand {
            user_id: UserId(user),
            work_id: WorkId(work),
            chapter_id: ChapterId(chapter),
            content: content.to_string(),
            client_timestamp: None,
        }
    }

    fn service(store: &MemoryStore) -> ChapterSaveService<MemoryStore, MemoryStore> {
        ChapterSaveService::new(store.clone(), store.clone())
    }

    #[tokio::test]
    async fn save_updates_chapter_and_work_totals() {
        let store = MemoryStore::default();
        store.add_work(7, 1, WorkType::Novel);
        store.add_chapter(3, 7, "<p>old</p>");
        store.add_chapter(4, 7, "<p>abcde</p>");

        let outcome = service(&store)
            .save(command(1, 7, 3, "<p>你好世界</p>"))
            .await
            .unwrap();

        assert_eq!(outcome.words, 4);
        let chapter = store.chapter(3).unwrap();
        assert_eq!(chapter.content, "<p>你好世界</p>");
        assert_eq!(chapter.words, 4);
        let work = store.work(7).unwrap();
        assert_eq!(work.words, 9);
        assert_eq!(work.num_chapters, 2);
    }

    #[tokio::test]
    async fn save_rejects_other_owner() {
        let store = MemoryStore::default();
        store.add_work(7, 1, WorkType::Novel);
        store.add_chapter(3, 7, "");

        let err = service(&store).save(command(2, 7, 3, "x")).await.unwrap_err();
        assert!(matches!(err, SaveError::Forbidden));
        assert_eq!(store.chapter(3).unwrap().content, "");
    }

    #[tokio::test]
    async fn save_rejects_chapter_of_another_work() {
        let store = MemoryStore::default();
        store.add_work(7, 1, WorkType::Novel);
        store.add_work(8, 1, WorkType::Novel);
        store.add_chapter(3, 8, "");

        let err = service(&store).save(command(1, 7, 3, "x")).await.unwrap_err();
        assert!(matches!(err, SaveError::ChapterNotFound));
    }

    #[tokio::test]
    async fn failed_write_leaves_chapter_and_totals_untouched() {
        let store = MemoryStore::default();
        store.add_work(7, 1, WorkType::Novel);
        store.add_chapter(3, 7, "");
        service(&store).save(command(1, 7, 3, "<p>abc</p>")).await.unwrap();
        store.fail_writes(true);

        let err = service(&store)
            .save(command(1, 7, 3, "<p>abcdef</p>"))
            .await
            .unwrap_err();
        assert!(matches!(err, SaveError::Storage(_)));
        assert_eq!(store.chapter(3).unwrap().content, "<p>abc</p>");
        assert_eq!(store.work(7).unwrap().words, 3);
    }

    #[tokio::test]
    async fn save_missing_work() {
        let store = MemoryStore::default();
        let err = service(&store).save(command(1, 99, 1, "x")).await.unwrap_err();
        assert!(matches!(err, SaveError::WorkNotFound));
    }
}
