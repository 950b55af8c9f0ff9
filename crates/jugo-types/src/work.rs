use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use std::fmt;
use std::str::FromStr;

macro_rules! numeric_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl $name {
            /// Ids are assigned by the database and start at 1.
            pub fn is_valid(&self) -> bool {
                self.0 > 0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = String;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                s.trim()
                    .parse::<i64>()
                    .map(Self)
                    .map_err(|_| format!(concat!("invalid ", $label, ": '{}'"), s))
            }
        }
    };
}

numeric_id!(
    /// Identifier of an authenticated caller (a user account).
    UserId,
    "user id"
);
numeric_id!(
    /// Identifier of a work (a novel or a screenplay).
    WorkId,
    "work id"
);
numeric_id!(
    /// Identifier of a chapter inside a work.
    ChapterId,
    "chapter id"
);

/// What kind of manuscript a work is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkType {
    Novel,
    Screenplay,
}

impl fmt::Display for WorkType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkType::Novel => write!(f, "novel"),
            WorkType::Screenplay => write!(f, "screenplay"),
        }
    }
}

impl FromStr for WorkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "novel" => Ok(WorkType::Novel),
            "screenplay" => Ok(WorkType::Screenplay),
            other => Err(format!("invalid work type: '{other}'")),
        }
    }
}

/// A work owned by a single user.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Work {
    pub id: WorkId,
    pub user_id: UserId,
    #[serde(rename = "type")]
    pub work_type: WorkType,
    pub title: String,
    /// Total counted words across all chapters.
    pub words: i64,
    pub num_chapters: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A chapter of a work. Content is stored as the editor's HTML fragment.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chapter {
    pub id: ChapterId,
    pub work_id: WorkId,
    pub title: String,
    pub content: String,
    pub words: i64,
    pub order_num: i64,
    pub updated_at: DateTime<Utc>,
}

/// What a save request targets. Only chapters are saved today.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SaveTarget {
    Chapter,
}

/// Body of `PUT /api/v1/works/{id}/save`.
#[derive(Debug, Clone, Deserialize)]
pub struct SaveRequest {
    #[serde(rename = "type")]
    pub target: SaveTarget,
    pub id: ChapterId,
    pub content: String,
}

/// Longest accepted work or chapter title, in characters.
pub const MAX_TITLE_CHARS: usize = 200;

/// Body of `POST /api/v1/works`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateWorkRequest {
    #[serde(rename = "type")]
    pub work_type: WorkType,
    pub title: String,
}

/// Body of `POST /api/v1/works/{id}/chapters`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateChapterRequest {
    pub title: String,
    #[serde(default)]
    pub content: String,
    /// Position in reading order; appended after the last chapter when absent.
    #[serde(default)]
    pub order: Option<i64>,
}

/// A work about to be inserted.
#[derive(Debug, Clone)]
pub struct NewWork {
    pub user_id: UserId,
    pub work_type: WorkType,
    pub title: String,
}

/// A chapter about to be inserted, with its content already counted.
#[derive(Debug, Clone)]
pub struct NewChapter {
    pub work_id: WorkId,
    pub title: String,
    pub content: String,
    pub words: i64,
    pub order_num: i64,
}

/// Result of a successful save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveOutcome {
    pub saved_at: DateTime<Utc>,
    pub words: i64,
}
