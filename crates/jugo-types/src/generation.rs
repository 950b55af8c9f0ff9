//! Submission payloads for generation tasks.
//!
//! Each payload carries the work it targets and the knobs for one
//! [`TaskKind`]. Shape checks live in `validate()` so the dispatcher can reject
//! a request before any task row exists.

use serde::{Deserialize, Serialize};

use crate::error::TaskError;
use crate::task::TaskKind;
use crate::work::{WorkId, WorkType};

const CONTINUE_LENGTH: std::ops::RangeInclusive<u32> = 100..=5000;
const MIN_EXPAND_LENGTH: u32 = 100;
const TOPIC_CHARS: std::ops::RangeInclusive<usize> = 5..=500;
const OUTLINE_CHAPTERS: std::ops::RangeInclusive<u32> = 1..=100;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContinueRequest {
    pub work_id: WorkId,
    /// Manuscript style the continuation is written in.
    #[serde(rename = "type")]
    pub work_type: WorkType,
    /// Preceding text to continue from.
    pub context: String,
    /// Target length of the continuation, in characters.
    pub length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolishRequest {
    pub work_id: WorkId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpandRequest {
    pub work_id: WorkId,
    pub content: String,
    /// Target length after expansion, in characters.
    pub length: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RewriteRequest {
    pub work_id: WorkId,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutlineRequest {
    pub work_id: WorkId,
    pub topic: String,
    /// Genre label, e.g. "urban fantasy" or "science fiction".
    pub genre: String,
    pub num_chapters: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NovelToScreenplayRequest {
    pub work_id: WorkId,
    /// Target running time in minutes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_scenes: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenplayToNovelRequest {
    pub work_id: WorkId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub num_chapters: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub word_per_chapter: Option<u32>,
}

/// A validated-or-not generation request of any kind.
#[derive(Debug, Clone)]
pub enum GenerationRequest {
    Continue(ContinueRequest),
    Polish(PolishRequest),
    Expand(ExpandRequest),
    Rewrite(RewriteRequest),
    Outline(OutlineRequest),
    NovelToScreenplay(NovelToScreenplayRequest),
    ScreenplayToNovel(ScreenplayToNovelRequest),
}

impl GenerationRequest {
    pub fn kind(&self) -> TaskKind {
        match self {
            GenerationRequest::Continue(_) => TaskKind::Continue,
            GenerationRequest::Polish(_) => TaskKind::Polish,
            GenerationRequest::Expand(_) => TaskKind::Expand,
            GenerationRequest::Rewrite(_) => TaskKind::Rewrite,
            GenerationRequest::Outline(_) => TaskKind::Outline,
            GenerationRequest::NovelToScreenplay(_) => TaskKind::NovelToScreenplay,
            GenerationRequest::ScreenplayToNovel(_) => TaskKind::ScreenplayToNovel,
        }
    }

    pub fn work_id(&self) -> WorkId {
        match self {
            GenerationRequest::Continue(r) => r.work_id,
            GenerationRequest::Polish(r) => r.work_id,
            GenerationRequest::Expand(r) => r.work_id,
            GenerationRequest::Rewrite(r) => r.work_id,
            GenerationRequest::Outline(r) => r.work_id,
            GenerationRequest::NovelToScreenplay(r) => r.work_id,
            GenerationRequest::ScreenplayToNovel(r) => r.work_id,
        }
    }

    /// Output token budget for the provider call.
    pub fn max_tokens(&self) -> u32 {
        match self {
            GenerationRequest::Continue(r) => r.length,
            GenerationRequest::Expand(r) => r.length,
            other => other.kind().fixed_token_budget().unwrap_or(4096),
        }
    }

    /// Serialized form stored on the task row.
    pub fn parameters(&self) -> serde_json::Value {
        let value = match self {
            GenerationRequest::Continue(r) => serde_json::to_value(r),
            GenerationRequest::Polish(r) => serde_json::to_value(r),
            GenerationRequest::Expand(r) => serde_json::to_value(r),
            GenerationRequest::Rewrite(r) => serde_json::to_value(r),
            GenerationRequest::Outline(r) => serde_json::to_value(r),
            GenerationRequest::NovelToScreenplay(r) => serde_json::to_value(r),
            GenerationRequest::ScreenplayToNovel(r) => serde_json::to_value(r),
        };
        value.unwrap_or(serde_json::Value::Null)
    }

    /// Check the request shape. Ownership and work type are checked later,
    /// against the stored work.
    pub fn validate(&self) -> Result<(), TaskError> {
        if !self.work_id().is_valid() {
            return Err(TaskError::Validation("workId is required".into()));
        }

        match self {
            GenerationRequest::Continue(r) => {
                require_text("context", &r.context)?;
                if !CONTINUE_LENGTH.contains(&r.length) {
                    return Err(TaskError::Validation(format!(
                        "length must be between {} and {}",
                        CONTINUE_LENGTH.start(),
                        CONTINUE_LENGTH.end()
                    )));
                }
            }
            GenerationRequest::Polish(r) => require_text("content", &r.content)?,
            GenerationRequest::Expand(r) => {
                require_text("content", &r.content)?;
                if r.length < MIN_EXPAND_LENGTH {
                    return Err(TaskError::Validation(format!(
                        "length must be at least {MIN_EXPAND_LENGTH}"
                    )));
                }
            }
            GenerationRequest::Rewrite(r) => require_text("content", &r.content)?,
            GenerationRequest::Outline(r) => {
                let topic_chars = r.topic.chars().count();
                if !TOPIC_CHARS.contains(&topic_chars) {
                    return Err(TaskError::Validation(format!(
                        "topic must be between {} and {} characters",
                        TOPIC_CHARS.start(),
                        TOPIC_CHARS.end()
                    )));
                }
                require_text("genre", &r.genre)?;
                if !OUTLINE_CHAPTERS.contains(&r.num_chapters) {
                    return Err(TaskError::Validation(format!(
                        "numChapters must be between {} and {}",
                        OUTLINE_CHAPTERS.start(),
                        OUTLINE_CHAPTERS.end()
                    )));
                }
            }
            GenerationRequest::NovelToScreenplay(_) | GenerationRequest::ScreenplayToNovel(_) => {}
        }

        Ok(())
    }
}

fn require_text(field: &str, value: &str) -> Result<(), TaskError> {
    if value.trim().is_empty() {
        Err(TaskError::Validation(format!("{field} is required")))
    } else {
        Ok(())
    }
}
