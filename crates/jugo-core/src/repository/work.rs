//! Work and chapter repository trait definitions.

use jugo_types::error::RepositoryError;
use jugo_types::work::{Chapter, ChapterId, NewChapter, NewWork, UserId, Work, WorkId};

use super::Page;

/// Works plus their denormalized word and chapter totals.
pub trait WorkRepository: Send + Sync {
    /// Insert a work with zeroed totals and return it.
    fn create(
        &self,
        work: &NewWork,
    ) -> impl std::future::Future<Output = Result<Work, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: WorkId,
    ) -> impl std::future::Future<Output = Result<Option<Work>, RepositoryError>> + Send;

    /// Works of one user, most recently updated first.
    fn list_by_user(
        &self,
        user_id: UserId,
        page: Page,
    ) -> impl std::future::Future<Output = Result<Vec<Work>, RepositoryError>> + Send;
}

/// Chapters. Every write also refreshes the owning work's `words` and
/// `num_chapters` in the same transaction, so the totals never disagree with
/// the chapters they summarize.
pub trait ChapterRepository: Send + Sync {
    /// Insert a chapter and return it.
    fn create(
        &self,
        chapter: &NewChapter,
    ) -> impl std::future::Future<Output = Result<Chapter, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: ChapterId,
    ) -> impl std::future::Future<Output = Result<Option<Chapter>, RepositoryError>> + Send;

    /// All chapters of a work in reading order.
    fn list_by_work(
        &self,
        work_id: WorkId,
    ) -> impl std::future::Future<Output = Result<Vec<Chapter>, RepositoryError>> + Send;

    /// Replace chapter content and its counted words.
    fn save_content(
        &self,
        id: ChapterId,
        content: &str,
        words: i64,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
