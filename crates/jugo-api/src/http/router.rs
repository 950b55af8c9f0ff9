//! Axum router configuration with middleware.
//!
//! REST routes live under `/api/v1/`, the realtime socket at `/ws`, and the
//! unauthenticated health check at `/health`.

use axum::Router;
use axum::routing::{get, post, put};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Generation submission
        .route("/ai/continue", post(handlers::ai::continue_writing))
        .route("/ai/polish", post(handlers::ai::polish))
        .route("/ai/expand", post(handlers::ai::expand))
        .route("/ai/rewrite", post(handlers::ai::rewrite))
        .route("/ai/outline", post(handlers::ai::outline))
        .route(
            "/ai/novel-to-screenplay",
            post(handlers::ai::novel_to_screenplay),
        )
        .route(
            "/ai/screenplay-to-novel",
            post(handlers::ai::screenplay_to_novel),
        )
        // Task status
        .route("/ai/tasks", get(handlers::ai::list_tasks))
        .route("/ai/tasks/{id}", get(handlers::ai::get_task))
        .route("/ai/tasks/{id}/cancel", post(handlers::ai::cancel_task))
        // Works and chapters
        .route(
            "/works",
            post(handlers::work::create_work).get(handlers::work::list_works),
        )
        .route("/works/{id}", get(handlers::work::get_work))
        .route(
            "/works/{id}/chapters",
            post(handlers::work::create_chapter).get(handlers::work::list_chapters),
        )
        // Manual save
        .route("/works/{id}/save", put(handlers::save::save_work));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(handlers::health::health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
