//! Manual save endpoint. Shares the save logic with realtime autosave.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, State};

use jugo_core::service::save::{SaveCommand, SaveService};
use jugo_types::work::{SaveOutcome, SaveRequest, SaveTarget, UserId, WorkId};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// PUT /api/v1/works/{id}/save
pub async fn save_work(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Path(work_id): Path<i64>,
    Json(body): Json<SaveRequest>,
) -> Result<Json<ApiResponse<SaveOutcome>>, AppError> {
    let start = Instant::now();
    let command = save_command(user_id, WorkId(work_id), body)?;
    let outcome = state.save_service.save(command).await?;
    Ok(Json(ApiResponse::success(outcome, start)))
}

fn save_command(
    user_id: UserId,
    work_id: WorkId,
    body: SaveRequest,
) -> Result<SaveCommand, AppError> {
    if !work_id.is_valid() || !body.id.is_valid() {
        return Err(AppError::Validation("work id and chapter id must be positive".into()));
    }
    match body.target {
        SaveTarget::Chapter => Ok(SaveCommand {
            user_id,
            work_id,
            chapter_id: body.id,
            content: body.content,
            client_timestamp: None,
        }),
    }
}
