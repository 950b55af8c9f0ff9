//! Generation task endpoints: submission, polling, listing and cancel.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};

use jugo_types::error::TaskError;
use jugo_types::generation::{
    ContinueRequest, ExpandRequest, GenerationRequest, NovelToScreenplayRequest, OutlineRequest,
    PolishRequest, RewriteRequest, ScreenplayToNovelRequest,
};
use jugo_types::task::{TaskAccepted, TaskId, TaskView};
use jugo_types::work::UserId;

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::PageQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

type Accepted = Result<Json<ApiResponse<TaskAccepted>>, AppError>;

async fn submit(state: &AppState, user_id: UserId, request: GenerationRequest) -> Accepted {
    let start = Instant::now();
    let accepted = state.dispatcher.submit(user_id, request).await?;
    let link = format!("/api/v1/ai/tasks/{}", accepted.task_id);
    Ok(Json(ApiResponse::success(accepted, start).with_link("status", link)))
}

/// POST /api/v1/ai/continue
pub async fn continue_writing(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Json(body): Json<ContinueRequest>,
) -> Accepted {
    submit(&state, user_id, GenerationRequest::Continue(body)).await
}

/// POST /api/v1/ai/polish
pub async fn polish(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Json(body): Json<PolishRequest>,
) -> Accepted {
    submit(&state, user_id, GenerationRequest::Polish(body)).await
}

/// POST /api/v1/ai/expand
pub async fn expand(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Json(body): Json<ExpandRequest>,
) -> Accepted {
    submit(&state, user_id, GenerationRequest::Expand(body)).await
}

/// POST /api/v1/ai/rewrite
pub async fn rewrite(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Json(body): Json<RewriteRequest>,
) -> Accepted {
    submit(&state, user_id, GenerationRequest::Rewrite(body)).await
}

/// POST /api/v1/ai/outline
pub async fn outline(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Json(body): Json<OutlineRequest>,
) -> Accepted {
    submit(&state, user_id, GenerationRequest::Outline(body)).await
}

/// POST /api/v1/ai/novel-to-screenplay
pub async fn novel_to_screenplay(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Json(body): Json<NovelToScreenplayRequest>,
) -> Accepted {
    submit(&state, user_id, GenerationRequest::NovelToScreenplay(body)).await
}

/// POST /api/v1/ai/screenplay-to-novel
pub async fn screenplay_to_novel(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Json(body): Json<ScreenplayToNovelRequest>,
) -> Accepted {
    submit(&state, user_id, GenerationRequest::ScreenplayToNovel(body)).await
}

/// Malformed ids cannot name an existing task.
fn parse_task_id(raw: &str) -> Result<TaskId, AppError> {
    raw.parse::<TaskId>()
        .map_err(|_| AppError::Task(TaskError::TaskNotFound))
}

/// GET /api/v1/ai/tasks/{id}
pub async fn get_task(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TaskView>>, AppError> {
    let start = Instant::now();
    let task_id = parse_task_id(&id)?;
    let view = state.dispatcher.get(user_id, &task_id).await?;
    Ok(Json(ApiResponse::success(view, start)))
}

/// GET /api/v1/ai/tasks - The caller's tasks, newest first.
pub async fn list_tasks(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<TaskView>>>, AppError> {
    let start = Instant::now();
    let tasks = state.dispatcher.list(user_id, query.page()).await?;
    Ok(Json(
        ApiResponse::success(tasks, start).with_link("self", "/api/v1/ai/tasks"),
    ))
}

/// POST /api/v1/ai/tasks/{id}/cancel
pub async fn cancel_task(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<TaskView>>, AppError> {
    let start = Instant::now();
    let task_id = parse_task_id(&id)?;
    let view = state.dispatcher.cancel(user_id, &task_id).await?;
    tracing::info!(task_id = %task_id, user_id = %user_id, "generation task cancelled");
    Ok(Json(ApiResponse::success(view, start)))
}
