//! Generation task dispatcher.
//!
//! Submission is synchronous up to the point where a `pending` row exists;
//! the job itself runs on its own tokio task. Running jobs are capped by a
//! semaphore and accepted-but-unfinished jobs by a counter, so a burst of
//! submissions is refused with [`TaskError::Overloaded`] instead of piling
//! up. Each job carries a cancellation token through the provider call.
//!
//! Progress checkpoints are 10 (prompt built), 30 (provider call started)
//! and 90 (result received), then 100 on completion. Every checkpoint and the
//! terminal outcome is pushed to the owner through the optional notifier.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use jugo_types::config::DispatcherConfig;
use jugo_types::error::TaskError;
use jugo_types::generation::GenerationRequest;
use jugo_types::protocol::{AiProgress, ServerMessage};
use jugo_types::task::{ProviderTier, Task, TaskAccepted, TaskId, TaskKind, TaskStatus, TaskView};
use jugo_types::work::{UserId, Work, WorkId};

use crate::llm::box_provider::BoxLlmProvider;
use crate::llm::retry::{RetryPolicy, complete_with_retry};
use crate::repository::Page;
use crate::repository::task::TaskRepository;
use crate::repository::work::{ChapterRepository, WorkRepository};

use super::notifier::TaskNotifier;
use super::prompt::build_prompt;

/// Error text stored on a task cancelled by its owner.
pub const CANCELLED: &str = "cancelled";

/// Error text stored on tasks found unfinished at startup.
pub const INTERRUPTED: &str = "interrupted by server restart";

/// The two provider tiers a task kind can be routed to.
#[derive(Clone)]
pub struct ProviderSet {
    pub quality: Arc<BoxLlmProvider>,
    pub economy: Arc<BoxLlmProvider>,
}

impl ProviderSet {
    pub fn for_tier(&self, tier: ProviderTier) -> &Arc<BoxLlmProvider> {
        match tier {
            ProviderTier::Quality => &self.quality,
            ProviderTier::Economy => &self.economy,
        }
    }
}

pub struct TaskDispatcher<T, W, C> {
    inner: Arc<Inner<T, W, C>>,
}

impl<T, W, C> Clone for TaskDispatcher<T, W, C> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

struct Inner<T, W, C> {
    tasks: T,
    works: W,
    chapters: C,
    providers: ProviderSet,
    notifier: Option<Arc<dyn TaskNotifier>>,
    permits: Semaphore,
    in_flight: Arc<AtomicUsize>,
    max_queued: usize,
    retry: RetryPolicy,
    running: DashMap<TaskId, CancellationToken>,
}

/// Everything a job needs once submission has returned.
struct Job {
    id: TaskId,
    user_id: UserId,
    kind: TaskKind,
    request: GenerationRequest,
    work: Work,
    token: CancellationToken,
}

/// One unit of the accepted-job budget, returned on drop.
struct QueueSlot(Arc<AtomicUsize>);

impl QueueSlot {
    fn reserve(counter: &Arc<AtomicUsize>, limit: usize) -> Option<Self> {
        counter
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |n| (n < limit).then_some(n + 1))
            .ok()
            .map(|_| Self(counter.clone()))
    }
}

impl Drop for QueueSlot {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<T, W, C> TaskDispatcher<T, W, C>
where
    T: TaskRepository + 'static,
    W: WorkRepository + 'static,
    C: ChapterRepository + 'static,
{
    pub fn new(
        tasks: T,
        works: W,
        chapters: C,
        providers: ProviderSet,
        notifier: Option<Arc<dyn TaskNotifier>>,
        config: &DispatcherConfig,
    ) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            inner: Arc::new(Inner {
                tasks,
                works,
                chapters,
                providers,
                notifier,
                permits: Semaphore::new(max_concurrent),
                in_flight: Arc::new(AtomicUsize::new(0)),
                max_queued: config.max_queued.max(max_concurrent),
                retry: RetryPolicy::from(config),
                running: DashMap::new(),
            }),
        }
    }

    /// Accept a generation request and start it in the background.
    ///
    /// Nothing is persisted unless every check passes.
    pub async fn submit(
        &self,
        user_id: UserId,
        request: GenerationRequest,
    ) -> Result<TaskAccepted, TaskError> {
        request.validate()?;
        let kind = request.kind();

        let work = self.inner.owned_work(user_id, request.work_id()).await?;
        if let Some(expected) = kind.required_work_type() {
            if work.work_type != expected {
                return Err(TaskError::WorkTypeMismatch {
                    expected,
                    actual: work.work_type,
                });
            }
        }

        let slot = QueueSlot::reserve(&self.inner.in_flight, self.inner.max_queued)
            .ok_or(TaskError::Overloaded)?;

        let task = Task::pending(user_id, work.id, kind, request.parameters());
        self.inner.tasks.create(&task).await?;

        let token = CancellationToken::new();
        self.inner.running.insert(task.id, token.clone());

        tracing::info!(
            task_id = %task.id,
            user_id = %user_id,
            work_id = %work.id,
            kind = %kind,
            "generation task accepted"
        );

        let job = Job {
            id: task.id,
            user_id,
            kind,
            request,
            work,
            token,
        };
        tokio::spawn(self.inner.clone().run(job, slot));

        Ok(TaskAccepted {
            task_id: task.id,
            status: TaskStatus::Pending,
            estimated_time: kind.estimated_seconds(),
        })
    }

    /// Status of one of the caller's tasks.
    pub async fn get(&self, user_id: UserId, id: &TaskId) -> Result<TaskView, TaskError> {
        let task = self.inner.owned_task(user_id, id).await?;
        Ok(TaskView::from(&task))
    }

    /// The caller's most recent tasks, newest first.
    pub async fn list(&self, user_id: UserId, page: Page) -> Result<Vec<TaskView>, TaskError> {
        let tasks = self.inner.tasks.list_by_user(user_id, page).await?;
        Ok(tasks.iter().map(TaskView::from).collect())
    }

    /// Stop one of the caller's unfinished tasks. It is recorded as failed
    /// with the error `cancelled`.
    pub async fn cancel(&self, user_id: UserId, id: &TaskId) -> Result<TaskView, TaskError> {
        let task = self.inner.owned_task(user_id, id).await?;
        if task.status.is_terminal() || !self.inner.tasks.fail(id, CANCELLED).await? {
            return Err(TaskError::AlreadyFinished);
        }
        if let Some((_, token)) = self.inner.running.remove(id) {
            token.cancel();
        }

        tracing::info!(task_id = %id, user_id = %user_id, kind = %task.kind, "generation task cancelled");
        self.inner
            .push(user_id, *id, task.progress, TaskStatus::Failed, None, Some(CANCELLED));

        let updated = self.inner.tasks.get(id).await?.ok_or(TaskError::TaskNotFound)?;
        Ok(TaskView::from(&updated))
    }

    /// Fail tasks left `pending` or `processing` by a previous process.
    pub async fn recover_interrupted(&self) -> Result<u64, TaskError> {
        let count = self.inner.tasks.fail_unfinished(INTERRUPTED).await?;
        if count > 0 {
            tracing::warn!(count, "marked interrupted generation tasks as failed");
        }
        Ok(count)
    }

    /// Accepted jobs that have not finished yet, running or waiting.
    pub fn in_flight(&self) -> usize {
        self.inner.in_flight.load(Ordering::Acquire)
    }
}

impl<T, W, C> Inner<T, W, C>
where
    T: TaskRepository + 'static,
    W: WorkRepository + 'static,
    C: ChapterRepository + 'static,
{
    async fn owned_work(&self, user_id: UserId, work_id: WorkId) -> Result<Work, TaskError> {
        let work = self
            .works
            .get_by_id(work_id)
            .await?
            .ok_or(TaskError::WorkNotFound)?;
        if work.user_id != user_id {
            return Err(TaskError::Forbidden);
        }
        Ok(work)
    }

    async fn owned_task(&self, user_id: UserId, id: &TaskId) -> Result<Task, TaskError> {
        let task = self.tasks.get(id).await?.ok_or(TaskError::TaskNotFound)?;
        if task.user_id != user_id {
            return Err(TaskError::Forbidden);
        }
        Ok(task)
    }

    async fn run(self: Arc<Self>, job: Job, _slot: QueueSlot) {
        let mut progress = 0u8;
        let outcome = tokio::select! {
            biased;
            _ = job.token.cancelled() => None,
            outcome = self.execute(&job, &mut progress) => Some(outcome),
        };

        match outcome {
            // The canceller already recorded the failure and pushed it.
            None => tracing::debug!(task_id = %job.id, "generation job stopped by cancellation"),
            Some(Ok(Some(text))) => self.finish(&job, text).await,
            Some(Ok(None)) => {
                tracing::debug!(task_id = %job.id, "task finished elsewhere, dropping job")
            }
            Some(Err(error)) => self.record_failure(&job, progress, error).await,
        }

        self.running.remove(&job.id);
    }

    /// Run the job up to the result. `Ok(None)` means the task became
    /// terminal under us and nothing more should be written.
    async fn execute(&self, job: &Job, progress: &mut u8) -> Result<Option<String>, String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| "dispatcher stopped".to_string())?;

        let chapters = if job.kind.required_work_type().is_some() {
            self.chapters
                .list_by_work(job.work.id)
                .await
                .map_err(|e| e.to_string())?
        } else {
            Vec::new()
        };
        let prompt = build_prompt(&job.request, &job.work, &chapters);

        if !self.checkpoint(job, progress, 10, "prompt built").await? {
            return Ok(None);
        }

        let provider = self.providers.for_tier(job.kind.provider_tier());
        if !self.checkpoint(job, progress, 30, "provider call started").await? {
            return Ok(None);
        }
        tracing::debug!(task_id = %job.id, provider = provider.name(), "calling generation provider");

        let response = complete_with_retry(provider, &prompt, &self.retry)
            .await
            .map_err(|e| e.to_string())?;

        if !self.checkpoint(job, progress, 90, "result received").await? {
            return Ok(None);
        }
        Ok(Some(response.content))
    }

    async fn checkpoint(
        &self,
        job: &Job,
        progress: &mut u8,
        value: u8,
        message: &str,
    ) -> Result<bool, String> {
        let advanced = self
            .tasks
            .mark_processing(&job.id, value)
            .await
            .map_err(|e| e.to_string())?;
        if advanced {
            *progress = value;
            self.push(job.user_id, job.id, value, TaskStatus::Processing, Some(message), None);
        }
        Ok(advanced)
    }

    async fn finish(&self, job: &Job, text: String) {
        match self.tasks.complete(&job.id, &text).await {
            Ok(true) => {
                tracing::info!(task_id = %job.id, kind = %job.kind, "generation task completed");
                self.push(job.user_id, job.id, 100, TaskStatus::Completed, None, None);
            }
            Ok(false) => tracing::debug!(task_id = %job.id, "task finished elsewhere, result discarded"),
            Err(err) => {
                tracing::error!(task_id = %job.id, error = %err, "failed to store task result");
                self.record_failure(job, 90, err.to_string()).await;
            }
        }
    }

    async fn record_failure(&self, job: &Job, progress: u8, error: String) {
        tracing::warn!(task_id = %job.id, kind = %job.kind, error = %error, "generation task failed");
        match self.tasks.fail(&job.id, &error).await {
            Ok(true) => self.push(job.user_id, job.id, progress, TaskStatus::Failed, None, Some(&error)),
            Ok(false) => {}
            Err(err) => tracing::error!(task_id = %job.id, error = %err, "failed to record task failure"),
        }
    }

    fn push(
        &self,
        user_id: UserId,
        task_id: TaskId,
        progress: u8,
        status: TaskStatus,
        message: Option<&str>,
        error: Option<&str>,
    ) {
        let Some(notifier) = &self.notifier else {
            return;
        };
        notifier.notify(
            user_id,
            ServerMessage::AiProgress(AiProgress {
                task_id,
                progress,
                status,
                message: message.map(str::to_string),
                error: error.map(str::to_string),
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use jugo_types::generation::{
        ContinueRequest, NovelToScreenplayRequest, PolishRequest, ScreenplayToNovelRequest,
    };
    use jugo_types::llm::LlmError;
    use jugo_types::work::WorkType;

    use crate::testing::{MemoryStore, RecordingNotifier, ScriptedProvider};

    type Dispatcher = TaskDispatcher<MemoryStore, MemoryStore, MemoryStore>;

    struct Fixture {
        store: MemoryStore,
        quality: ScriptedProvider,
        economy: ScriptedProvider,
        notifier: Arc<RecordingNotifier>,
        dispatcher: Dispatcher,
    }

    fn fixture_with(config: DispatcherConfig, quality: ScriptedProvider, economy: ScriptedProvider) -> Fixture {
        let store = MemoryStore::default();
        store.add_work(7, 1, WorkType::Novel);
        store.add_work(8, 1, WorkType::Screenplay);
        store.add_work(9, 2, WorkType::Novel);
        let notifier = Arc::new(RecordingNotifier::default());
        let providers = ProviderSet {
            quality: Arc::new(BoxLlmProvider::new(quality.clone())),
            economy: Arc::new(BoxLlmProvider::new(economy.clone())),
        };
        let dispatcher = TaskDispatcher::new(
            store.clone(),
            store.clone(),
            store.clone(),
            providers,
            Some(notifier.clone() as Arc<dyn TaskNotifier>),
            &config,
        );
        Fixture {
            store,
            quality,
            economy,
            notifier,
            dispatcher,
        }
    }

    fn fixture() -> Fixture {
        fixture_with(
            DispatcherConfig::default(),
            ScriptedProvider::new("quality"),
            ScriptedProvider::new("economy"),
        )
    }

    fn polish(work: i64) -> GenerationRequest {
        GenerationRequest::Polish(PolishRequest {
            work_id: WorkId(work),
            content: "<p>It was a dark and stormy night.</p>".into(),
            style: None,
        })
    }

    fn continue_req(work: i64) -> GenerationRequest {
        GenerationRequest::Continue(ContinueRequest {
            work_id: WorkId(work),
            work_type: WorkType::Novel,
            context: "The door creaked.".into(),
            length: 300,
            style: None,
        })
    }

    async fn wait_terminal(store: &MemoryStore, id: &TaskId) -> Task {
        for _ in 0..200 {
            if let Some(task) = store.task(id) {
                if task.status.is_terminal() {
                    return task;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {id} never finished");
    }

    async fn wait_progress(store: &MemoryStore, id: &TaskId, progress: u8) {
        for _ in 0..200 {
            if store.task(id).is_some_and(|t| t.progress >= progress) {
                return;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("task {id} never reached {progress}");
    }

    fn progress_pushes(notifier: &RecordingNotifier) -> Vec<(u8, TaskStatus)> {
        notifier
            .messages()
            .into_iter()
            .filter_map(|(_, message)| match message {
                ServerMessage::AiProgress(p) => Some((p.progress, p.status)),
                _ => None,
            })
            .collect()
    }

    #[tokio::test]
    async fn accepted_task_runs_to_completion() {
        let f = fixture();
        f.quality.push_ok("A polished night.");

        let accepted = f.dispatcher.submit(UserId(1), polish(7)).await.unwrap();
        assert_eq!(accepted.status, TaskStatus::Pending);
        assert_eq!(accepted.estimated_time, 20);

        let task = wait_terminal(&f.store, &accepted.task_id).await;
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.progress, 100);
        assert_eq!(task.result.as_deref(), Some("A polished night."));
        assert!(task.completed_at.is_some());
        assert_eq!(task.kind, TaskKind::Polish);

        assert_eq!(
            progress_pushes(&f.notifier),
            vec![
                (10, TaskStatus::Processing),
                (30, TaskStatus::Processing),
                (90, TaskStatus::Processing),
                (100, TaskStatus::Completed),
            ]
        );
        assert!(f.notifier.messages().iter().all(|(user, _)| *user == UserId(1)));
        assert_eq!(f.dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn kinds_route_to_their_provider_tier() {
        let f = fixture();
        let a = f.dispatcher.submit(UserId(1), continue_req(7)).await.unwrap();
        let b = f.dispatcher.submit(UserId(1), polish(7)).await.unwrap();
        wait_terminal(&f.store, &a.task_id).await;
        wait_terminal(&f.store, &b.task_id).await;

        assert_eq!(f.economy.calls(), 1);
        assert_eq!(f.quality.calls(), 1);
        assert_eq!(f.economy.requests()[0].max_tokens, 300);
        assert_eq!(f.quality.requests()[0].max_tokens, 4096);
    }

    #[tokio::test]
    async fn foreign_work_is_forbidden_and_creates_nothing() {
        let f = fixture();
        let err = f.dispatcher.submit(UserId(1), polish(9)).await.unwrap_err();
        assert!(matches!(err, TaskError::Forbidden));
        assert_eq!(f.store.task_count(), 0);
    }

    #[tokio::test]
    async fn missing_work_and_invalid_shape_create_nothing() {
        let f = fixture();
        let err = f.dispatcher.submit(UserId(1), polish(404)).await.unwrap_err();
        assert!(matches!(err, TaskError::WorkNotFound));

        let mut bad = continue_req(7);
        if let GenerationRequest::Continue(r) = &mut bad {
            r.length = 10;
        }
        let err = f.dispatcher.submit(UserId(1), bad).await.unwrap_err();
        assert!(matches!(err, TaskError::Validation(_)));
        assert_eq!(f.store.task_count(), 0);
    }

    #[tokio::test]
    async fn conversion_requires_matching_work_type() {
        let f = fixture();
        let request = GenerationRequest::ScreenplayToNovel(ScreenplayToNovelRequest {
            work_id: WorkId(7),
            num_chapters: None,
            word_per_chapter: None,
        });
        let err = f.dispatcher.submit(UserId(1), request).await.unwrap_err();
        assert!(matches!(
            err,
            TaskError::WorkTypeMismatch {
                expected: WorkType::Screenplay,
                actual: WorkType::Novel
            }
        ));
        assert_eq!(f.store.task_count(), 0);
    }

    #[tokio::test]
    async fn conversion_prompt_includes_chapters() {
        let f = fixture();
        f.store.add_chapter(1, 7, "<p>The ferry docked at dawn.</p>");
        let request = GenerationRequest::NovelToScreenplay(NovelToScreenplayRequest {
            work_id: WorkId(7),
            target_duration: None,
            num_scenes: Some(12),
        });

        let accepted = f.dispatcher.submit(UserId(1), request).await.unwrap();
        assert_eq!(accepted.estimated_time, 120);
        wait_terminal(&f.store, &accepted.task_id).await;

        let sent = &f.quality.requests()[0];
        assert!(sent.messages[0].content.contains("The ferry docked at dawn."));
        assert_eq!(sent.max_tokens, 8192);
    }

    #[tokio::test]
    async fn provider_failure_is_recorded() {
        let f = fixture();
        f.quality.push_err(LlmError::AuthenticationFailed);

        let accepted = f.dispatcher.submit(UserId(1), polish(7)).await.unwrap();
        let task = wait_terminal(&f.store, &accepted.task_id).await;

        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.progress, 30);
        assert!(task.error.unwrap().contains("authentication"));
        assert!(task.completed_at.is_some());
        assert!(task.result.is_none());
        assert_eq!(
            progress_pushes(&f.notifier).last(),
            Some(&(30, TaskStatus::Failed))
        );
    }

    #[tokio::test]
    async fn full_queue_rejects_without_creating_a_task() {
        let config = DispatcherConfig {
            max_concurrent: 1,
            max_queued: 1,
            ..DispatcherConfig::default()
        };
        let (quality, gate) = ScriptedProvider::gated("quality");
        let f = fixture_with(config, quality, ScriptedProvider::new("economy"));

        let first = f.dispatcher.submit(UserId(1), polish(7)).await.unwrap();
        let err = f.dispatcher.submit(UserId(1), polish(7)).await.unwrap_err();
        assert!(matches!(err, TaskError::Overloaded));
        assert_eq!(f.store.task_count(), 1);

        gate.add_permits(1);
        wait_terminal(&f.store, &first.task_id).await;
        // The slot is free again.
        for _ in 0..200 {
            if f.dispatcher.in_flight() == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        gate.add_permits(1);
        assert!(f.dispatcher.submit(UserId(1), polish(7)).await.is_ok());
    }

    #[tokio::test]
    async fn cancel_fails_running_task() {
        let (quality, gate) = ScriptedProvider::gated("quality");
        let f = fixture_with(DispatcherConfig::default(), quality, ScriptedProvider::new("economy"));

        let accepted = f.dispatcher.submit(UserId(1), polish(7)).await.unwrap();
        wait_progress(&f.store, &accepted.task_id, 30).await;

        let view = f.dispatcher.cancel(UserId(1), &accepted.task_id).await.unwrap();
        assert_eq!(view.status, TaskStatus::Failed);
        assert_eq!(view.error.as_deref(), Some(CANCELLED));
        assert!(view.completed_at.is_some());

        // Letting the provider answer afterwards changes nothing.
        gate.add_permits(1);
        tokio::time::sleep(Duration::from_millis(20)).await;
        let task = f.store.task(&accepted.task_id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert!(task.result.is_none());

        let again = f.dispatcher.cancel(UserId(1), &accepted.task_id).await.unwrap_err();
        assert!(matches!(again, TaskError::AlreadyFinished));
    }

    #[tokio::test]
    async fn lookups_are_owner_scoped() {
        let f = fixture();
        let accepted = f.dispatcher.submit(UserId(1), polish(7)).await.unwrap();
        wait_terminal(&f.store, &accepted.task_id).await;

        let view = f.dispatcher.get(UserId(1), &accepted.task_id).await.unwrap();
        assert_eq!(view.status, TaskStatus::Completed);
        assert!(view.result.is_some());

        assert!(matches!(
            f.dispatcher.get(UserId(2), &accepted.task_id).await,
            Err(TaskError::Forbidden)
        ));
        assert!(matches!(
            f.dispatcher.cancel(UserId(2), &accepted.task_id).await,
            Err(TaskError::Forbidden)
        ));
        assert!(matches!(
            f.dispatcher.get(UserId(1), &TaskId::new()).await,
            Err(TaskError::TaskNotFound)
        ));

        assert_eq!(f.dispatcher.list(UserId(1), Page::default()).await.unwrap().len(), 1);
        assert!(f.dispatcher.list(UserId(2), Page::default()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn interrupted_tasks_are_failed_on_recovery() {
        let f = fixture();
        let stale = Task::pending(UserId(1), WorkId(7), TaskKind::Outline, serde_json::json!({}));
        TaskRepository::create(&f.store, &stale).await.unwrap();

        assert_eq!(f.dispatcher.recover_interrupted().await.unwrap(), 1);
        let task = f.store.task(&stale.id).unwrap();
        assert_eq!(task.status, TaskStatus::Failed);
        assert_eq!(task.error.as_deref(), Some(INTERRUPTED));
        assert_eq!(f.dispatcher.recover_interrupted().await.unwrap(), 0);
    }
}
