//! In-memory collaborators shared by the unit tests of this crate.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::Utc;
use tokio::sync::Semaphore;

use jugo_types::error::RepositoryError;
use jugo_types::llm::{
    CompletionRequest, CompletionResponse, LlmError, ProviderCapabilities, StopReason, Usage,
};
use jugo_types::protocol::ServerMessage;
use jugo_types::task::{Task, TaskId, TaskStatus};
use jugo_types::work::{Chapter, ChapterId, NewChapter, NewWork, UserId, Work, WorkId, WorkType};

use crate::llm::provider::LlmProvider;
use crate::repository::Page;
use crate::repository::task::TaskRepository;
use crate::repository::work::{ChapterRepository, WorkRepository};
use crate::service::text::count_words;
use crate::task::notifier::TaskNotifier;

/// Works, chapters and tasks behind one mutex.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

#[derive(Default)]
struct StoreState {
    works: HashMap<WorkId, Work>,
    chapters: HashMap<ChapterId, Chapter>,
    tasks: Vec<Task>,
    fail_writes: bool,
}

impl StoreState {
    fn refresh_totals(&mut self, work_id: WorkId) {
        let (words, count) = self
            .chapters
            .values()
            .filter(|c| c.work_id == work_id)
            .fold((0, 0), |(words, count), c| (words + c.words, count + 1));
        if let Some(work) = self.works.get_mut(&work_id) {
            work.words = words;
            work.num_chapters = count;
            work.updated_at = Utc::now();
        }
    }
}

impl MemoryStore {
    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap()
    }

    pub fn add_work(&self, id: i64, user: i64, work_type: WorkType) {
        let now = Utc::now();
        self.lock().works.insert(
            WorkId(id),
            Work {
                id: WorkId(id),
                user_id: UserId(user),
                work_type,
                title: format!("Work {id}"),
                words: 0,
                num_chapters: 0,
                created_at: now,
                updated_at: now,
            },
        );
    }

    pub fn add_chapter(&self, id: i64, work: i64, content: &str) {
        self.lock().chapters.insert(
            ChapterId(id),
            Chapter {
                id: ChapterId(id),
                work_id: WorkId(work),
                title: format!("Chapter {id}"),
                content: content.to_string(),
                words: count_words(content),
                order_num: id,
                updated_at: Utc::now(),
            },
        );
    }

    /// Make every chapter content write fail without changing anything.
    pub fn fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    pub fn work(&self, id: i64) -> Option<Work> {
        self.lock().works.get(&WorkId(id)).cloned()
    }

    pub fn chapter(&self, id: i64) -> Option<Chapter> {
        self.lock().chapters.get(&ChapterId(id)).cloned()
    }

    pub fn task(&self, id: &TaskId) -> Option<Task> {
        self.lock().tasks.iter().find(|t| t.id == *id).cloned()
    }

    pub fn task_count(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Apply `f` to a non-terminal task. Returns whether it was applied.
    fn update_open_task(&self, id: &TaskId, f: impl FnOnce(&mut Task)) -> bool {
        let mut state = self.lock();
        match state
            .tasks
            .iter_mut()
            .find(|t| t.id == *id && !t.status.is_terminal())
        {
            Some(task) => {
                f(task);
                task.updated_at = Utc::now();
                true
            }
            None => false,
        }
    }
}

impl WorkRepository for MemoryStore {
    async fn create(&self, work: &NewWork) -> Result<Work, RepositoryError> {
        let mut state = self.lock();
        let id = WorkId(state.works.keys().map(|id| id.0).max().unwrap_or(0) + 1);
        let now = Utc::now();
        let work = Work {
            id,
            user_id: work.user_id,
            work_type: work.work_type,
            title: work.title.clone(),
            words: 0,
            num_chapters: 0,
            created_at: now,
            updated_at: now,
        };
        state.works.insert(id, work.clone());
        Ok(work)
    }

    async fn get_by_id(&self, id: WorkId) -> Result<Option<Work>, RepositoryError> {
        Ok(self.lock().works.get(&id).cloned())
    }

    async fn list_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Work>, RepositoryError> {
        let mut works: Vec<Work> = self
            .lock()
            .works
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        works.sort_by(|a, b| b.updated_at.cmp(&a.updated_at).then(b.id.cmp(&a.id)));
        Ok(works
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }
}

impl ChapterRepository for MemoryStore {
    async fn create(&self, chapter: &NewChapter) -> Result<Chapter, RepositoryError> {
        let mut state = self.lock();
        if !state.works.contains_key(&chapter.work_id) {
            return Err(RepositoryError::NotFound);
        }
        let id = ChapterId(state.chapters.keys().map(|id| id.0).max().unwrap_or(0) + 1);
        let chapter = Chapter {
            id,
            work_id: chapter.work_id,
            title: chapter.title.clone(),
            content: chapter.content.clone(),
            words: chapter.words,
            order_num: chapter.order_num,
            updated_at: Utc::now(),
        };
        state.chapters.insert(id, chapter.clone());
        state.refresh_totals(chapter.work_id);
        Ok(chapter)
    }

    async fn get_by_id(&self, id: ChapterId) -> Result<Option<Chapter>, RepositoryError> {
        Ok(self.lock().chapters.get(&id).cloned())
    }

    async fn list_by_work(&self, work_id: WorkId) -> Result<Vec<Chapter>, RepositoryError> {
        let mut chapters: Vec<Chapter> = self
            .lock()
            .chapters
            .values()
            .filter(|c| c.work_id == work_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| (c.order_num, c.id.0));
        Ok(chapters)
    }

    async fn save_content(
        &self,
        id: ChapterId,
        content: &str,
        words: i64,
    ) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if state.fail_writes {
            return Err(RepositoryError::Query("disk I/O error".into()));
        }
        let chapter = state.chapters.get_mut(&id).ok_or(RepositoryError::NotFound)?;
        chapter.content = content.to_string();
        chapter.words = words;
        chapter.updated_at = Utc::now();
        let work_id = chapter.work_id;
        state.refresh_totals(work_id);
        Ok(())
    }
}

impl TaskRepository for MemoryStore {
    async fn create(&self, task: &Task) -> Result<(), RepositoryError> {
        let mut state = self.lock();
        if state.tasks.iter().any(|t| t.id == task.id) {
            return Err(RepositoryError::Conflict(task.id.to_string()));
        }
        state.tasks.push(task.clone());
        Ok(())
    }

    async fn get(&self, id: &TaskId) -> Result<Option<Task>, RepositoryError> {
        Ok(self.task(id))
    }

    async fn list_by_user(&self, user_id: UserId, page: Page) -> Result<Vec<Task>, RepositoryError> {
        let state = self.lock();
        let mut tasks: Vec<Task> = state
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(tasks
            .into_iter()
            .skip(page.offset as usize)
            .take(page.limit as usize)
            .collect())
    }

    async fn mark_processing(&self, id: &TaskId, progress: u8) -> Result<bool, RepositoryError> {
        Ok(self.update_open_task(id, |task| {
            task.status = TaskStatus::Processing;
            task.progress = task.progress.max(progress.min(100));
        }))
    }

    async fn complete(&self, id: &TaskId, result: &str) -> Result<bool, RepositoryError> {
        Ok(self.update_open_task(id, |task| {
            task.status = TaskStatus::Completed;
            task.progress = 100;
            task.result = Some(result.to_string());
            task.completed_at = Some(Utc::now());
        }))
    }

    async fn fail(&self, id: &TaskId, error: &str) -> Result<bool, RepositoryError> {
        Ok(self.update_open_task(id, |task| {
            task.status = TaskStatus::Failed;
            task.error = Some(error.to_string());
            task.completed_at = Some(Utc::now());
        }))
    }

    async fn fail_unfinished(&self, error: &str) -> Result<u64, RepositoryError> {
        let mut state = self.lock();
        let now = Utc::now();
        let mut count = 0;
        for task in state.tasks.iter_mut().filter(|t| !t.status.is_terminal()) {
            task.status = TaskStatus::Failed;
            task.error = Some(error.to_string());
            task.completed_at = Some(now);
            task.updated_at = now;
            count += 1;
        }
        Ok(count)
    }
}

/// A provider that replays a script of results. An exhausted script answers
/// `"generated text"`.
#[derive(Clone)]
pub struct ScriptedProvider {
    inner: Arc<ScriptedInner>,
}

struct ScriptedInner {
    name: String,
    capabilities: ProviderCapabilities,
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
    gate: Option<Arc<Semaphore>>,
}

impl ScriptedProvider {
    pub fn new(name: &str) -> Self {
        Self::build(name, None)
    }

    /// A provider whose every call waits for one permit on the returned gate.
    pub fn gated(name: &str) -> (Self, Arc<Semaphore>) {
        let gate = Arc::new(Semaphore::new(0));
        (Self::build(name, Some(gate.clone())), gate)
    }

    fn build(name: &str, gate: Option<Arc<Semaphore>>) -> Self {
        Self {
            inner: Arc::new(ScriptedInner {
                name: name.to_string(),
                capabilities: ProviderCapabilities {
                    max_context_tokens: 128_000,
                    max_output_tokens: 8_192,
                },
                script: Mutex::new(VecDeque::new()),
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
                gate,
            }),
        }
    }

    pub fn push_ok(&self, text: &str) {
        self.inner.script.lock().unwrap().push_back(Ok(text.to_string()));
    }

    pub fn push_err(&self, err: LlmError) {
        self.inner.script.lock().unwrap().push_back(Err(err));
    }

    pub fn calls(&self) -> usize {
        self.inner.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.inner.requests.lock().unwrap().clone()
    }
}

impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn capabilities(&self) -> &ProviderCapabilities {
        &self.inner.capabilities
    }

    async fn complete(&self, request: &CompletionRequest) -> Result<CompletionResponse, LlmError> {
        self.inner.calls.fetch_add(1, Ordering::SeqCst);
        self.inner.requests.lock().unwrap().push(request.clone());
        if let Some(gate) = &self.inner.gate {
            gate.acquire().await.unwrap().forget();
        }

        let next = self.inner.script.lock().unwrap().pop_front();
        let content = next.unwrap_or_else(|| Ok("generated text".to_string()))?;
        Ok(CompletionResponse {
            id: format!("resp-{}", self.calls()),
            content,
            model: self.inner.name.clone(),
            stop_reason: StopReason::EndTurn,
            usage: Usage {
                input_tokens: 10,
                output_tokens: 20,
            },
        })
    }
}

/// Records every notification.
#[derive(Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<(UserId, ServerMessage)>>,
}

impl RecordingNotifier {
    pub fn messages(&self) -> Vec<(UserId, ServerMessage)> {
        self.messages.lock().unwrap().clone()
    }
}

impl TaskNotifier for RecordingNotifier {
    fn notify(&self, user_id: UserId, message: ServerMessage) {
        self.messages.lock().unwrap().push((user_id, message));
    }
}
