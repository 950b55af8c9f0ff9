//! WebSocket endpoint for realtime editor sessions.
//!
//! `GET /ws?token=<api key>` authenticates before upgrading; an unknown or
//! missing token is answered with 401 and no upgrade, even when the request
//! could not have been upgraded anyway. After the upgrade the
//! socket is adapted to [`Frame`]s and handed to the session loops in
//! jugo-core, which own liveness, size limits and teardown.

use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::{IntoResponse, Response};
use futures_util::future;
use futures_util::{SinkExt, StreamExt};

use jugo_core::realtime::connection::{SessionLimits, run_session};
use jugo_core::realtime::frame::Frame;
use jugo_core::realtime::hub::Hub;
use jugo_core::realtime::session::SessionHandle;
use jugo_core::repository::credential::CredentialVerifier;
use jugo_types::work::UserId;

use crate::http::error::AppError;
use crate::http::extractors::query::ConnectQuery;
use crate::state::AppState;

/// Upgrade an authenticated request to a realtime session.
pub async fn ws_handler(
    State(state): State<AppState>,
    Query(query): Query<ConnectQuery>,
    ws: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Result<Response, AppError> {
    let token = query.token.unwrap_or_default();
    let user_id = state.credentials.verify(&token).await?;
    let ws = match ws {
        Ok(ws) => ws,
        Err(rejection) => return Ok(rejection.into_response()),
    };

    let limits = SessionLimits::from(&state.config.realtime);
    let queue_capacity = state.config.realtime.outbound_queue;
    let hub = state.hub.clone();

    tracing::debug!(user_id = %user_id, "upgrading realtime connection");

    Ok(ws
        .max_message_size(limits.max_message_bytes)
        .max_frame_size(limits.max_message_bytes)
        .on_upgrade(move |socket| serve_socket(socket, hub, user_id, limits, queue_capacity)))
}

async fn serve_socket(
    socket: WebSocket,
    hub: Hub,
    user_id: UserId,
    limits: SessionLimits,
    queue_capacity: usize,
) {
    let (session, outbound) = SessionHandle::new(user_id, queue_capacity);
    let session_id = session.id();
    let (sink, stream) = socket.split();

    let stream = stream.map(|message| message.map(to_frame));
    let sink = sink.with(|frame: Frame| future::ready(Ok::<_, axum::Error>(to_message(frame))));

    tracing::info!(session_id = %session_id, user_id = %user_id, "realtime session opened");
    run_session(hub, session, outbound, stream, sink, limits).await;
    tracing::info!(session_id = %session_id, user_id = %user_id, "realtime session closed");
}

fn to_frame(message: Message) -> Frame {
    match message {
        Message::Text(text) => Frame::Text(text.as_str().to_owned()),
        Message::Binary(bytes) => Frame::Binary(bytes.to_vec()),
        Message::Ping(bytes) => Frame::Ping(bytes.to_vec()),
        Message::Pong(bytes) => Frame::Pong(bytes.to_vec()),
        Message::Close(_) => Frame::Close,
    }
}

fn to_message(frame: Frame) -> Message {
    match frame {
        Frame::Text(text) => Message::Text(text.into()),
        Frame::Binary(bytes) => Message::Binary(bytes.into()),
        Frame::Ping(bytes) => Message::Ping(bytes.into()),
        Frame::Pong(bytes) => Message::Pong(bytes.into()),
        Frame::Close => Message::Close(None),
    }
}
