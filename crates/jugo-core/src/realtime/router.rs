//! Inbound message handling.

use std::sync::Arc;

use chrono::Utc;

use jugo_types::protocol::{AutosavePayload, ClientMessage, ServerMessage};

use crate::service::save::{SaveCommand, SaveService};

use super::session::SessionHandle;

/// A message the router refused. The hub reports it to the originating
/// session as an `error` message.
#[derive(Debug, thiserror::Error)]
pub enum RouterError {
    #[error("invalid message: {0}")]
    InvalidMessage(String),
}

/// Handles decoded inbound messages for the hub.
///
/// Replies go straight onto the originating session's queue. A failed
/// autosave, including one missing its ids, is answered in-band with a failed
/// `autosave_ack` and is not a router error.
pub trait MessageRouter: Send + Sync + 'static {
    fn route(
        &self,
        session: &SessionHandle,
        message: ClientMessage,
    ) -> impl std::future::Future<Output = Result<(), RouterError>> + Send;
}

/// The production router: `ping` and `autosave`.
pub struct ProtocolRouter<S> {
    saves: Arc<S>,
}

impl<S: SaveService> ProtocolRouter<S> {
    pub fn new(saves: Arc<S>) -> Self {
        Self { saves }
    }

    async fn autosave(
        &self,
        session: &SessionHandle,
        payload: AutosavePayload,
    ) -> Result<(), RouterError> {
        if !payload.work_id.is_valid() || !payload.chapter_id.is_valid() {
            tracing::debug!(session_id = %session.id(), "autosave without workId or chapterId");
            session.send(&ServerMessage::save_failed(
                "autosave requires workId and chapterId",
            ));
            return Ok(());
        }

        let command = SaveCommand {
            user_id: session.user_id(),
            work_id: payload.work_id,
            chapter_id: payload.chapter_id,
            content: payload.content,
            client_timestamp: payload.timestamp,
        };

        let reply = match self.saves.save(command).await {
            Ok(outcome) => ServerMessage::saved(outcome.saved_at, outcome.words),
            Err(err) => {
                tracing::warn!(
                    session_id = %session.id(),
                    user_id = %session.user_id(),
                    work_id = %payload.work_id,
                    chapter_id = %payload.chapter_id,
                    error = %err,
                    "autosave failed"
                );
                ServerMessage::save_failed(err.to_string())
            }
        };
        session.send(&reply);
        Ok(())
    }
}

impl<S: SaveService + 'static> MessageRouter for ProtocolRouter<S> {
    async fn route(&self, session: &SessionHandle, message: ClientMessage) -> Result<(), RouterError> {
        match message {
            ClientMessage::Ping => {
                session.send(&ServerMessage::pong_at(Utc::now()));
                Ok(())
            }
            ClientMessage::Autosave(payload) => self.autosave(session, payload).await,
        }
    }
}
