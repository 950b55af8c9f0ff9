//! Realtime wire protocol.
//!
//! Every frame is a JSON object with a required `type` tag and camelCase
//! fields. Inbound and outbound messages are separate enums so the server can
//! never be asked to route one of its own notifications.
//!
//! ```json
//! {"type":"autosave","workId":7,"chapterId":3,"content":"<p>...</p>"}
//! {"type":"autosave_ack","success":true,"savedAt":"2026-01-01T00:00:00Z","words":128}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::task::{TaskId, TaskStatus};
use crate::work::{ChapterId, WorkId};

/// Messages a client may send.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Persist the current content of a chapter.
    Autosave(AutosavePayload),
    /// Keep-alive. Answered with `pong`.
    Ping,
}

/// Body of an `autosave` message.
///
/// Missing ids decode as zero and are rejected by the router, so a client
/// gets an `error` reply rather than silence.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosavePayload {
    #[serde(default = "unset_work")]
    pub work_id: WorkId,
    #[serde(default = "unset_chapter")]
    pub chapter_id: ChapterId,
    #[serde(default)]
    pub content: String,
    /// Client-side edit time, passed through to the save collaborator.
    #[serde(default)]
    pub timestamp: Option<String>,
}

fn unset_work() -> WorkId {
    WorkId(0)
}

fn unset_chapter() -> ChapterId {
    ChapterId(0)
}

/// Why an inbound payload could not be turned into a [`ClientMessage`].
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum DecodeError {
    #[error("malformed message: {0}")]
    Malformed(String),

    #[error("unknown message type: '{0}'")]
    UnknownKind(String),
}

impl ClientMessage {
    pub const KINDS: [&'static str; 2] = ["autosave", "ping"];

    /// Decode one text frame.
    ///
    /// The tag is inspected first so an unrecognized `type` is reported as
    /// [`DecodeError::UnknownKind`] instead of a generic parse failure.
    pub fn decode(payload: &str) -> Result<Self, DecodeError> {
        let value: serde_json::Value =
            serde_json::from_str(payload).map_err(|e| DecodeError::Malformed(e.to_string()))?;

        let kind = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or_else(|| DecodeError::Malformed("missing 'type' field".into()))?;

        if !Self::KINDS.contains(&kind) {
            return Err(DecodeError::UnknownKind(kind.to_string()));
        }

        serde_json::from_value(value).map_err(|e| DecodeError::Malformed(e.to_string()))
    }
}

/// Messages the server sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    AutosaveAck(AutosaveAck),
    Pong {
        /// Server time, RFC 3339.
        timestamp: String,
    },
    AiProgress(AiProgress),
    Error {
        error: String,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AutosaveAck {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub words: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Progress notification for a generation task.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AiProgress {
    pub task_id: TaskId,
    pub progress: u8,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ServerMessage {
    pub fn pong_at(now: DateTime<Utc>) -> Self {
        ServerMessage::Pong {
            timestamp: now.to_rfc3339(),
        }
    }

    pub fn saved(saved_at: DateTime<Utc>, words: i64) -> Self {
        ServerMessage::AutosaveAck(AutosaveAck {
            success: true,
            saved_at: Some(saved_at),
            words: Some(words),
            error: None,
        })
    }

    pub fn save_failed(error: impl Into<String>) -> Self {
        ServerMessage::AutosaveAck(AutosaveAck {
            success: false,
            saved_at: None,
            words: None,
            error: Some(error.into()),
        })
    }

    pub fn error(error: impl Into<String>) -> Self {
        ServerMessage::Error {
            error: error.into(),
        }
    }

    /// Wire form of this message.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_ping() {
        assert_eq!(ClientMessage::decode(r#"{"type":"ping"}"#), Ok(ClientMessage::Ping));
    }

    #[test]
    fn decode_autosave() {
        let msg = ClientMessage::decode(
            r#"{"type":"autosave","workId":7,"chapterId":3,"content":"<p>hello</p>","timestamp":"2026-01-01T00:00:00Z"}"#,
        )
        .unwrap();
        match msg {
            ClientMessage::Autosave(p) => {
                assert_eq!(p.work_id, WorkId(7));
                assert_eq!(p.chapter_id, ChapterId(3));
                assert_eq!(p.content, "<p>hello</p>");
                assert_eq!(p.timestamp.as_deref(), Some("2026-01-01T00:00:00Z"));
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn decode_autosave_without_ids_defaults_to_zero() {
        let msg = ClientMessage::decode(r#"{"type":"autosave","content":"x"}"#).unwrap();
        let ClientMessage::Autosave(p) = msg else {
            panic!("expected autosave");
        };
        assert!(!p.work_id.is_valid());
        assert!(!p.chapter_id.is_valid());
    }

    #[test]
    fn decode_unknown_kind() {
        assert_eq!(
            ClientMessage::decode(r#"{"type":"subscribe","workId":1}"#),
            Err(DecodeError::UnknownKind("subscribe".into()))
        );
        // Server-only kinds are unknown when sent by a client.
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"pong"}"#),
            Err(DecodeError::UnknownKind(_))
        ));
    }

    #[test]
    fn decode_malformed() {
        assert!(matches!(ClientMessage::decode("not json"), Err(DecodeError::Malformed(_))));
        assert!(matches!(ClientMessage::decode(r#"{"workId":1}"#), Err(DecodeError::Malformed(_))));
        assert!(matches!(
            ClientMessage::decode(r#"{"type":"autosave","workId":"seven"}"#),
            Err(DecodeError::Malformed(_))
        ));
    }

    #[test]
    fn encode_ack_success() {
        let saved_at = DateTime::parse_from_rfc3339("2026-03-01T10:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let json: serde_json::Value =
            serde_json::from_str(&ServerMessage::saved(saved_at, 128).encode().unwrap()).unwrap();
        assert_eq!(json["type"], "autosave_ack");
        assert_eq!(json["success"], true);
        assert_eq!(json["words"], 128);
        assert!(json["savedAt"].as_str().unwrap().starts_with("2026-03-01T10:00:00"));
        assert!(json.get("error").is_none());
    }

    #[test]
    fn encode_ack_failure_keeps_success_false() {
        let json: serde_json::Value =
            serde_json::from_str(&ServerMessage::save_failed("chapter not found").encode().unwrap())
                .unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "chapter not found");
        assert!(json.get("savedAt").is_none());
    }

    #[test]
    fn encode_progress() {
        let id = TaskId::new();
        let msg = ServerMessage::AiProgress(AiProgress {
            task_id: id,
            progress: 30,
            status: TaskStatus::Processing,
            message: Some("provider call started".into()),
            error: None,
        });
        let json: serde_json::Value = serde_json::from_str(&msg.encode().unwrap()).unwrap();
        assert_eq!(json["type"], "ai_progress");
        assert_eq!(json["taskId"], id.to_string());
        assert_eq!(json["progress"], 30);
        assert_eq!(json["status"], "processing");
    }

    #[test]
    fn encode_pong_and_error() {
        let json: serde_json::Value =
            serde_json::from_str(&ServerMessage::pong_at(Utc::now()).encode().unwrap()).unwrap();
        assert_eq!(json["type"], "pong");
        assert!(DateTime::parse_from_rfc3339(json["timestamp"].as_str().unwrap()).is_ok());

        let json: serde_json::Value =
            serde_json::from_str(&ServerMessage::error("bad ids").encode().unwrap()).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["error"], "bad ids");
    }
}
