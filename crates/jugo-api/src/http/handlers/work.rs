//! Work and chapter endpoints.

use std::time::Instant;

use axum::Json;
use axum::extract::{Path, Query, State};

use jugo_types::work::{Chapter, CreateChapterRequest, CreateWorkRequest, Work, WorkId};

use crate::http::error::AppError;
use crate::http::extractors::auth::Authenticated;
use crate::http::extractors::query::PageQuery;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/works
pub async fn create_work(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Json(body): Json<CreateWorkRequest>,
) -> Result<Json<ApiResponse<Work>>, AppError> {
    let start = Instant::now();
    let work = state.work_service.create_work(user_id, body).await?;
    let id = work.id;
    Ok(Json(
        ApiResponse::success(work, start)
            .with_link("self", format!("/api/v1/works/{id}"))
            .with_link("chapters", format!("/api/v1/works/{id}/chapters")),
    ))
}

/// GET /api/v1/works
pub async fn list_works(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Query(query): Query<PageQuery>,
) -> Result<Json<ApiResponse<Vec<Work>>>, AppError> {
    let start = Instant::now();
    let works = state.work_service.list_works(user_id, query.page()).await?;
    Ok(Json(ApiResponse::success(works, start)))
}

/// GET /api/v1/works/{id}
pub async fn get_work(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Path(work_id): Path<i64>,
) -> Result<Json<ApiResponse<Work>>, AppError> {
    let start = Instant::now();
    let work = state.work_service.get_work(user_id, WorkId(work_id)).await?;
    Ok(Json(ApiResponse::success(work, start)))
}

/// POST /api/v1/works/{id}/chapters
pub async fn create_chapter(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Path(work_id): Path<i64>,
    Json(body): Json<CreateChapterRequest>,
) -> Result<Json<ApiResponse<Chapter>>, AppError> {
    let start = Instant::now();
    let chapter = state
        .work_service
        .create_chapter(user_id, WorkId(work_id), body)
        .await?;
    Ok(Json(
        ApiResponse::success(chapter, start).with_link("save", format!("/api/v1/works/{work_id}/save")),
    ))
}

/// GET /api/v1/works/{id}/chapters
pub async fn list_chapters(
    State(state): State<AppState>,
    Authenticated(user_id): Authenticated,
    Path(work_id): Path<i64>,
) -> Result<Json<ApiResponse<Vec<Chapter>>>, AppError> {
    let start = Instant::now();
    let chapters = state
        .work_service
        .list_chapters(user_id, WorkId(work_id))
        .await?;
    Ok(Json(ApiResponse::success(chapters, start)))
}

#[cfg(test)]
mod tests {
    use axum::Router;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use jugo_types::config::AppConfig;
    use serde_json::{Value, json};
    use tower::ServiceExt;

    use crate::http::router::build_router;
    use crate::state::AppState;

    async fn app_with_key() -> (Router, String, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let state = AppState::init(dir.path().to_path_buf(), AppConfig::default())
            .await
            .unwrap();
        let user_id = state.credentials.create_user("writer").await.unwrap();
        let key = state.credentials.create_key(user_id, "cli").await.unwrap();
        (build_router(state), key, dir)
    }

    async fn send(
        app: &Router,
        method: &str,
        uri: &str,
        key: &str,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let builder = Request::builder()
            .method(method)
            .uri(uri)
            .header("authorization", format!("Bearer {key}"));
        let request = match body {
            Some(body) => builder
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_create_work_and_chapter_over_http() {
        let (app, key, _dir) = app_with_key().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/works",
            &key,
            Some(json!({"type": "novel", "title": "Tides"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let work_id = body["data"]["id"].as_i64().unwrap();
        assert_eq!(body["data"]["type"], "novel");
        assert_eq!(body["_links"]["chapters"], format!("/api/v1/works/{work_id}/chapters"));

        let (status, body) = send(
            &app,
            "POST",
            &format!("/api/v1/works/{work_id}/chapters"),
            &key,
            Some(json!({"title": "One", "content": "<p>abc</p>"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["orderNum"], 1);
        assert_eq!(body["data"]["words"], 3);

        let (status, body) =
            send(&app, "GET", &format!("/api/v1/works/{work_id}"), &key, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["data"]["numChapters"], 1);
        assert_eq!(body["data"]["words"], 3);

        let (_, body) = send(&app, "GET", "/api/v1/works", &key, None).await;
        assert_eq!(body["data"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_blank_title_is_rejected() {
        let (app, key, _dir) = app_with_key().await;

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/works",
            &key,
            Some(json!({"type": "screenplay", "title": "  "})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["errors"][0]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_works_require_a_key() {
        let (app, _key, _dir) = app_with_key().await;

        let (status, _) = send(&app, "GET", "/api/v1/works", "jugo_wrong", None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }
}
