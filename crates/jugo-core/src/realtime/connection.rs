//! Per-connection read and write loops.
//!
//! The read loop forwards text frames to the hub and enforces the read
//! deadline, which only a pong pushes forward. The write loop drains the
//! session's outbound queue, pings every `ping_period`, and bounds every
//! write by `write_wait`. Either loop failing tears the whole session down.

use std::fmt::Display;
use std::time::Duration;

use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use jugo_types::config::RealtimeConfig;

use super::frame::Frame;
use super::hub::Hub;
use super::session::SessionHandle;

/// Liveness and size limits for one connection.
#[derive(Debug, Clone, Copy)]
pub struct SessionLimits {
    pub pong_wait: Duration,
    pub ping_period: Duration,
    pub write_wait: Duration,
    pub max_message_bytes: usize,
}

impl From<&RealtimeConfig> for SessionLimits {
    fn from(config: &RealtimeConfig) -> Self {
        Self {
            pong_wait: config.pong_wait(),
            ping_period: config.ping_period(),
            write_wait: config.write_wait(),
            max_message_bytes: config.max_message_bytes,
        }
    }
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self::from(&RealtimeConfig::default())
    }
}

/// Drive one admitted-to-be session until either side ends it.
///
/// Admits `session` to `hub`, runs the write loop on its own task and the
/// read loop on this one, then removes the session and waits for the writer
/// to flush and send its close frame.
pub async fn run_session<St, Si, E>(
    hub: Hub,
    session: SessionHandle,
    outbound: mpsc::Receiver<String>,
    stream: St,
    sink: Si,
    limits: SessionLimits,
) where
    St: Stream<Item = Result<Frame, E>> + Unpin + Send,
    Si: Sink<Frame> + Unpin + Send + 'static,
    Si::Error: Display,
    E: Display,
{
    if hub.admit(session.clone()).await.is_err() {
        tracing::debug!(session_id = %session.id(), "hub stopped, rejecting session");
        session.mark_closed();
        return;
    }

    let teardown = CancellationToken::new();
    let writer = tokio::spawn(write_loop(
        sink,
        outbound,
        limits,
        teardown.clone(),
        session.clone(),
    ));

    read_loop(&hub, &session, stream, limits, &teardown).await;

    hub.remove(&session).await;
    teardown.cancel();
    if let Err(err) = writer.await {
        tracing::warn!(session_id = %session.id(), error = %err, "write loop panicked");
    }
    session.mark_closed();
    tracing::debug!(session_id = %session.id(), user_id = %session.user_id(), "session closed");
}

async fn read_loop<St, E>(
    hub: &Hub,
    session: &SessionHandle,
    mut stream: St,
    limits: SessionLimits,
    teardown: &CancellationToken,
) where
    St: Stream<Item = Result<Frame, E>> + Unpin,
    E: Display,
{
    let mut deadline = Instant::now() + limits.pong_wait;

    loop {
        let next = tokio::select! {
            _ = teardown.cancelled() => return,
            next = tokio::time::timeout_at(deadline, stream.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                tracing::debug!(session_id = %session.id(), "read deadline expired");
                return;
            }
            Ok(None) => return,
            Ok(Some(Err(err))) => {
                tracing::debug!(session_id = %session.id(), error = %err, "transport read error");
                return;
            }
            Ok(Some(Ok(frame))) => frame,
        };

        if frame.len() > limits.max_message_bytes {
            tracing::warn!(
                session_id = %session.id(),
                size = frame.len(),
                limit = limits.max_message_bytes,
                "inbound frame too large"
            );
            return;
        }

        match frame {
            Frame::Text(text) => {
                if hub.dispatch(session, text).await.is_err() {
                    return;
                }
            }
            Frame::Pong(_) => deadline = Instant::now() + limits.pong_wait,
            Frame::Close => return,
            Frame::Ping(_) | Frame::Binary(_) => {}
        }
    }
}

async fn write_loop<Si>(
    mut sink: Si,
    mut outbound: mpsc::Receiver<String>,
    limits: SessionLimits,
    teardown: CancellationToken,
    session: SessionHandle,
) where
    Si: Sink<Frame> + Unpin,
    Si::Error: Display,
{
    let mut ticker = tokio::time::interval_at(Instant::now() + limits.ping_period, limits.ping_period);

    loop {
        let frame = tokio::select! {
            message = outbound.recv() => match message {
                Some(text) => Frame::Text(text),
                None => {
                    // Queue closed by the hub: say goodbye and stop.
                    let _ = write_frame(&mut sink, Frame::Close, limits.write_wait, &session).await;
                    break;
                }
            },
            _ = ticker.tick() => Frame::Ping(Vec::new()),
        };

        if !write_frame(&mut sink, frame, limits.write_wait, &session).await {
            break;
        }
    }

    teardown.cancel();
}

async fn write_frame<Si>(sink: &mut Si, frame: Frame, wait: Duration, session: &SessionHandle) -> bool
where
    Si: Sink<Frame> + Unpin,
    Si::Error: Display,
{
    match tokio::time::timeout(wait, sink.send(frame)).await {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            tracing::debug!(session_id = %session.id(), error = %err, "transport write error");
            false
        }
        Err(_) => {
            tracing::debug!(session_id = %session.id(), "write deadline expired");
            false
        }
    }
}
