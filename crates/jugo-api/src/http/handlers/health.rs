//! GET /health -- no auth.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct Health {
    pub status: &'static str,
    pub version: &'static str,
    pub database: bool,
    pub sessions: usize,
    pub tasks_in_flight: usize,
}

/// Database ping plus live session and task counts. 503 when the database
/// does not answer.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<Health>) {
    let database = match state.db_pool.ping().await {
        Ok(()) => true,
        Err(err) => {
            tracing::warn!(error = %err, "health check database ping failed");
            false
        }
    };

    let (status, code) = if database {
        ("ok", StatusCode::OK)
    } else {
        ("degraded", StatusCode::SERVICE_UNAVAILABLE)
    };

    (
        code,
        Json(Health {
            status,
            version: env!("CARGO_PKG_VERSION"),
            database,
            sessions: state.hub.count(),
            tasks_in_flight: state.dispatcher.in_flight(),
        }),
    )
}
