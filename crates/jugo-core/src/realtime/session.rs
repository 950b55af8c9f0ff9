//! A live realtime connection as seen by the rest of the server.
//!
//! The handle is cheap to clone and shared between the hub, the router, and
//! the connection loops. Outbound delivery never blocks: a full queue drops
//! the message and a closed queue refuses it.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::mpsc;

use jugo_types::protocol::ServerMessage;
use jugo_types::session::{SendOutcome, SessionId, SessionState};
use jugo_types::work::UserId;

#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    id: SessionId,
    user_id: UserId,
    state: AtomicU8,
    /// `None` once the queue has been closed.
    outbound: Mutex<Option<mpsc::Sender<String>>>,
}

impl SessionHandle {
    /// Create a session in the `connecting` state along with the receiving
    /// end of its outbound queue, which the write loop owns.
    pub fn new(user_id: UserId, queue_capacity: usize) -> (Self, mpsc::Receiver<String>) {
        let (tx, rx) = mpsc::channel(queue_capacity.max(1));
        let handle = Self {
            inner: Arc::new(SessionInner {
                id: SessionId::new(),
                user_id,
                state: AtomicU8::new(SessionState::Connecting as u8),
                outbound: Mutex::new(Some(tx)),
            }),
        };
        (handle, rx)
    }

    pub fn id(&self) -> SessionId {
        self.inner.id
    }

    pub fn user_id(&self) -> UserId {
        self.inner.user_id
    }

    pub fn state(&self) -> SessionState {
        SessionState::from_u8(self.inner.state.load(Ordering::Acquire))
    }

    pub fn is_open(&self) -> bool {
        self.state() == SessionState::Open
    }

    /// Serialize and enqueue a message.
    pub fn send(&self, message: &ServerMessage) -> SendOutcome {
        match message.encode() {
            Ok(text) => self.send_text(text),
            Err(err) => {
                tracing::warn!(session_id = %self.id(), error = %err, "failed to encode outbound message");
                SendOutcome::Dropped
            }
        }
    }

    /// Enqueue an already-encoded message.
    pub fn send_text(&self, text: String) -> SendOutcome {
        if self.state() >= SessionState::Closing {
            return SendOutcome::Closed;
        }
        let guard = self.outbound();
        let Some(tx) = guard.as_ref() else {
            return SendOutcome::Closed;
        };
        match tx.try_send(text) {
            Ok(()) => SendOutcome::Queued,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::debug!(session_id = %self.id(), "outbound queue full, message dropped");
                SendOutcome::Dropped
            }
            Err(mpsc::error::TrySendError::Closed(_)) => SendOutcome::Closed,
        }
    }

    /// Close the outbound queue. Already-queued messages are still flushed by
    /// the write loop, which then sends a close frame. Idempotent.
    pub fn close_queue(&self) {
        self.advance(SessionState::Closing);
        self.outbound().take();
    }

    pub(crate) fn mark_open(&self) {
        self.advance(SessionState::Open);
    }

    pub(crate) fn mark_closed(&self) {
        self.close_queue();
        self.advance(SessionState::Closed);
    }

    /// Move the state forward; never backward.
    fn advance(&self, to: SessionState) {
        let _ = self
            .inner
            .state
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                ((to as u8) > current).then_some(to as u8)
            });
    }

    fn outbound(&self) -> MutexGuard<'_, Option<mpsc::Sender<String>>> {
        self.inner
            .outbound
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id())
            .field("user_id", &self.user_id())
            .field("state", &self.state())
            .finish()
    }
}
