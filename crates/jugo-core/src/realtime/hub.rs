//! The connection registry.
//!
//! Membership changes and inbound dispatch are funneled through a single
//! control loop reading three bounded queues (register, unregister,
//! inbound), which gives them one total order. Point-to-point delivery and
//! the session count read the membership maps directly under a shared lock.
//!
//! A caller may hold several sessions (two browser tabs). They are kept in
//! admission order and delivery targets the most recently admitted one that
//! is still open. Removing it re-exposes the previous one.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;

use jugo_types::protocol::{ClientMessage, DecodeError, ServerMessage};
use jugo_types::session::{SendOutcome, SessionId};
use jugo_types::work::UserId;

use crate::task::notifier::TaskNotifier;

use super::router::MessageRouter;
use super::session::SessionHandle;

/// The control loop has stopped (server shutdown).
#[derive(Debug, thiserror::Error)]
#[error("hub is not running")]
pub struct HubClosed;

struct Register {
    session: SessionHandle,
    done: oneshot::Sender<()>,
}

struct Unregister {
    session_id: SessionId,
    done: oneshot::Sender<()>,
}

struct Inbound {
    session_id: SessionId,
    payload: String,
}

#[derive(Default)]
struct Membership {
    sessions: HashMap<SessionId, SessionHandle>,
    /// Admission order per caller, oldest first.
    by_caller: HashMap<UserId, Vec<SessionId>>,
}

impl Membership {
    fn insert(&mut self, session: SessionHandle) {
        let id = session.id();
        self.by_caller.entry(session.user_id()).or_default().push(id);
        self.sessions.insert(id, session);
    }

    fn remove(&mut self, id: &SessionId) -> Option<SessionHandle> {
        let session = self.sessions.remove(id)?;
        if let Some(ids) = self.by_caller.get_mut(&session.user_id()) {
            ids.retain(|s| s != id);
            if ids.is_empty() {
                self.by_caller.remove(&session.user_id());
            }
        }
        Some(session)
    }

    fn latest_for(&self, user_id: UserId) -> Option<&SessionHandle> {
        self.by_caller
            .get(&user_id)?
            .iter()
            .rev()
            .filter_map(|id| self.sessions.get(id))
            .find(|s| s.is_open())
    }
}

/// Cloneable handle to the registry.
#[derive(Clone)]
pub struct Hub {
    register_tx: mpsc::Sender<Register>,
    unregister_tx: mpsc::Sender<Unregister>,
    inbound_tx: mpsc::Sender<Inbound>,
    membership: Arc<RwLock<Membership>>,
    shutdown: CancellationToken,
}

impl Hub {
    /// Spawn the control loop with `router` handling inbound messages.
    ///
    /// `queue_capacity` bounds each of the three control queues.
    pub fn start<R: MessageRouter>(router: R, queue_capacity: usize) -> Self {
        let capacity = queue_capacity.max(1);
        let (register_tx, register_rx) = mpsc::channel(capacity);
        let (unregister_tx, unregister_rx) = mpsc::channel(capacity);
        let (inbound_tx, inbound_rx) = mpsc::channel(capacity);

        let hub = Self {
            register_tx,
            unregister_tx,
            inbound_tx,
            membership: Arc::new(RwLock::new(Membership::default())),
            shutdown: CancellationToken::new(),
        };

        let control = ControlLoop {
            router,
            membership: hub.membership.clone(),
            register_rx,
            unregister_rx,
            inbound_rx,
            shutdown: hub.shutdown.clone(),
        };
        tokio::spawn(control.run());

        hub
    }

    /// Add a session to the registry. Returns once the control loop has
    /// applied it, so a following `send_to_caller` already sees it.
    pub async fn admit(&self, session: SessionHandle) -> Result<(), HubClosed> {
        let (done, applied) = oneshot::channel();
        self.register_tx
            .send(Register { session, done })
            .await
            .map_err(|_| HubClosed)?;
        applied.await.map_err(|_| HubClosed)
    }

    /// Remove a session and close its outbound queue. Idempotent.
    ///
    /// When the hub is already stopped the queue is closed directly.
    pub async fn remove(&self, session: &SessionHandle) {
        let (done, applied) = oneshot::channel();
        let request = Unregister {
            session_id: session.id(),
            done,
        };
        if self.unregister_tx.send(request).await.is_err() || applied.await.is_err() {
            session.close_queue();
        }
    }

    /// Hand one raw inbound payload to the control loop.
    pub async fn dispatch(&self, session: &SessionHandle, payload: String) -> Result<(), HubClosed> {
        self.inbound_tx
            .send(Inbound {
                session_id: session.id(),
                payload,
            })
            .await
            .map_err(|_| HubClosed)
    }

    /// Best-effort delivery to the caller's most recently admitted live
    /// session. `None` when the caller has no live session; nothing is
    /// kept for later.
    pub fn send_to_caller(&self, user_id: UserId, message: &ServerMessage) -> Option<SendOutcome> {
        let target = self.read().latest_for(user_id).cloned()?;
        Some(target.send(message))
    }

    /// Number of admitted sessions.
    pub fn count(&self) -> usize {
        self.read().sessions.len()
    }

    /// Stop the control loop and close every session's outbound queue.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    fn read(&self) -> RwLockReadGuard<'_, Membership> {
        self.membership
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl TaskNotifier for Hub {
    fn notify(&self, user_id: UserId, message: ServerMessage) {
        if self.send_to_caller(user_id, &message).is_none() {
            tracing::trace!(user_id = %user_id, "no live session for task notification");
        }
    }
}

struct ControlLoop<R> {
    router: R,
    membership: Arc<RwLock<Membership>>,
    register_rx: mpsc::Receiver<Register>,
    unregister_rx: mpsc::Receiver<Unregister>,
    inbound_rx: mpsc::Receiver<Inbound>,
    shutdown: CancellationToken,
}

impl<R: MessageRouter> ControlLoop<R> {
    async fn run(mut self) {
        tracing::debug!("hub control loop started");
        loop {
            tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => break,
                Some(Register { session, done }) = self.register_rx.recv() => {
                    self.admit(session);
                    let _ = done.send(());
                }
                Some(Unregister { session_id, done }) = self.unregister_rx.recv() => {
                    self.remove(&session_id);
                    let _ = done.send(());
                }
                Some(inbound) = self.inbound_rx.recv() => {
                    self.handle_inbound(inbound).await;
                }
                else => break,
            }
        }

        let sessions: Vec<SessionHandle> = self.write().sessions.drain().map(|(_, s)| s).collect();
        self.write().by_caller.clear();
        for session in sessions {
            session.close_queue();
        }
        tracing::debug!("hub control loop stopped");
    }

    fn admit(&self, session: SessionHandle) {
        session.mark_open();
        tracing::info!(
            session_id = %session.id(),
            user_id = %session.user_id(),
            "session registered"
        );
        self.write().insert(session);
    }

    fn remove(&self, session_id: &SessionId) {
        let removed = self.write().remove(session_id);
        if let Some(session) = removed {
            session.close_queue();
            tracing::info!(
                session_id = %session.id(),
                user_id = %session.user_id(),
                "session unregistered"
            );
        }
    }

    async fn handle_inbound(&self, inbound: Inbound) {
        let session = {
            let membership = self
                .membership
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            membership.sessions.get(&inbound.session_id).cloned()
        };
        let Some(session) = session else {
            tracing::debug!(session_id = %inbound.session_id, "dropping message from unregistered session");
            return;
        };

        let message = match ClientMessage::decode(&inbound.payload) {
            Ok(message) => message,
            Err(DecodeError::UnknownKind(kind)) => {
                tracing::warn!(session_id = %session.id(), kind = %kind, "unknown message type");
                return;
            }
            Err(DecodeError::Malformed(reason)) => {
                tracing::warn!(session_id = %session.id(), reason = %reason, "malformed message dropped");
                return;
            }
        };

        if let Err(err) = self.router.route(&session, message).await {
            tracing::warn!(session_id = %session.id(), error = %err, "message rejected");
            session.send(&ServerMessage::error(err.to_string()));
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Membership> {
        self.membership
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
