//! Generation task types.
//!
//! A task is one asynchronous generation job: created `pending` on submission,
//! driven through `processing` by the dispatcher, and finished as `completed`
//! or `failed`. Tasks are the only durable record of a job; progress pushes
//! over the realtime channel are best-effort mirrors of what is stored here.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

use crate::work::{UserId, WorkId, WorkType};

/// Unique identifier for a generation task, wrapping a UUID v7 (time-sortable).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// Which provider class a task kind is routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderTier {
    /// Higher quality, used where precise control of the output matters.
    Quality,
    /// Cheaper, used for bulk prose generation.
    Economy,
}

/// The kind of generation a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Continue,
    Polish,
    Expand,
    Rewrite,
    Outline,
    NovelToScreenplay,
    ScreenplayToNovel,
}

impl TaskKind {
    pub const ALL: [TaskKind; 7] = [
        TaskKind::Continue,
        TaskKind::Polish,
        TaskKind::Expand,
        TaskKind::Rewrite,
        TaskKind::Outline,
        TaskKind::NovelToScreenplay,
        TaskKind::ScreenplayToNovel,
    ];

    /// Static completion estimate returned on submission, in seconds.
    pub fn estimated_seconds(&self) -> u32 {
        match self {
            TaskKind::Continue => 30,
            TaskKind::Polish => 20,
            TaskKind::Expand => 40,
            TaskKind::Rewrite => 25,
            TaskKind::Outline => 60,
            TaskKind::NovelToScreenplay | TaskKind::ScreenplayToNovel => 120,
        }
    }

    pub fn provider_tier(&self) -> ProviderTier {
        match self {
            TaskKind::Continue | TaskKind::Expand | TaskKind::Rewrite => ProviderTier::Economy,
            TaskKind::Polish
            | TaskKind::Outline
            | TaskKind::NovelToScreenplay
            | TaskKind::ScreenplayToNovel => ProviderTier::Quality,
        }
    }

    /// Work type a task of this kind requires, if any.
    pub fn required_work_type(&self) -> Option<WorkType> {
        match self {
            TaskKind::NovelToScreenplay => Some(WorkType::Novel),
            TaskKind::ScreenplayToNovel => Some(WorkType::Screenplay),
            _ => None,
        }
    }

    /// Token budget for kinds with a fixed budget. Continue and expand use
    /// the caller-requested length instead.
    pub fn fixed_token_budget(&self) -> Option<u32> {
        match self {
            TaskKind::Polish | TaskKind::Rewrite | TaskKind::Outline => Some(4096),
            TaskKind::NovelToScreenplay | TaskKind::ScreenplayToNovel => Some(8192),
            TaskKind::Continue | TaskKind::Expand => None,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskKind::Continue => "continue",
            TaskKind::Polish => "polish",
            TaskKind::Expand => "expand",
            TaskKind::Rewrite => "rewrite",
            TaskKind::Outline => "outline",
            TaskKind::NovelToScreenplay => "novel_to_screenplay",
            TaskKind::ScreenplayToNovel => "screenplay_to_novel",
        };
        f.write_str(s)
    }
}

impl FromStr for TaskKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TaskKind::ALL
            .into_iter()
            .find(|k| k.to_string() == s)
            .ok_or_else(|| format!("invalid task kind: '{s}'"))
    }
}

/// Task lifecycle states.
///
/// - Pending: accepted, waiting for a worker slot
/// - Processing: running, progress advancing
/// - Completed: result stored, terminal
/// - Failed: error stored, terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::Processing => write!(f, "processing"),
            TaskStatus::Completed => write!(f, "completed"),
            TaskStatus::Failed => write!(f, "failed"),
        }
    }
}

impl FromStr for TaskStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(TaskStatus::Pending),
            "processing" => Ok(TaskStatus::Processing),
            "completed" => Ok(TaskStatus::Completed),
            "failed" => Ok(TaskStatus::Failed),
            other => Err(format!("invalid task status: '{other}'")),
        }
    }
}

/// A persisted generation task.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub user_id: UserId,
    pub work_id: WorkId,
    pub kind: TaskKind,
    pub status: TaskStatus,
    /// 0..=100, never decreases while processing.
    pub progress: u8,
    /// The submitted request, kept verbatim for auditing and reruns.
    pub parameters: serde_json::Value,
    pub result: Option<String>,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Set exactly when the task reaches a terminal status.
    pub completed_at: Option<DateTime<Utc>>,
}

impl Task {
    /// A freshly submitted task in the `pending` state.
    pub fn pending(
        user_id: UserId,
        work_id: WorkId,
        kind: TaskKind,
        parameters: serde_json::Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: TaskId::new(),
            user_id,
            work_id,
            kind,
            status: TaskStatus::Pending,
            progress: 0,
            parameters,
            result: None,
            error: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        }
    }
}

/// Response body for an accepted submission.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskAccepted {
    pub task_id: TaskId,
    pub status: TaskStatus,
    pub estimated_time: u32,
}

/// Polling view of a task.
///
/// `result` only appears once completed, `error` once failed, and
/// `completedAt` once terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskView {
    pub task_id: TaskId,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub work_id: WorkId,
    pub status: TaskStatus,
    pub progress: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl From<&Task> for TaskView {
    fn from(task: &Task) -> Self {
        Self {
            task_id: task.id,
            kind: task.kind,
            work_id: task.work_id,
            status: task.status,
            progress: task.progress,
            result: match task.status {
                TaskStatus::Completed => task.result.clone(),
                _ => None,
            },
            error: match task.status {
                TaskStatus::Failed => task.error.clone(),
                _ => None,
            },
            created_at: task.created_at,
            completed_at: task.completed_at.filter(|_| task.status.is_terminal()),
        }
    }
}
