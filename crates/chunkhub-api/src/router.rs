//! Route definitions for the ChunkHub HTTP API.
//!
//! All routes are mounted under `/api`. The router receives `AppState` and
//! passes it to all handlers via Axum's `State` extractor.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let max_request = usize::try_from(state.config.storage.max_chunk_request_bytes)
        .unwrap_or(usize::MAX);

    let api_routes = Router::new()
        .merge(upload_routes())
        .merge(file_routes())
        .merge(health_routes());

    let cors = middleware::cors::build_cors_layer(&state.config.server.cors);

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(max_request))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Chunk transfer endpoints
fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/upload/chunk", post(handlers::upload::upload_chunk))
        .route("/upload/check/{chunk_key}", get(handlers::upload::check_chunk))
        .route("/upload/merge", post(handlers::upload::merge_chunks))
}

/// Assembled file endpoints
fn file_routes() -> Router<AppState> {
    Router::new()
        .route("/upload/files", get(handlers::files::list_files))
        .route("/upload/files/{file_name}", delete(handlers::files::delete_file))
        .route("/upload/download/{file_name}", get(handlers::files::download_file))
}

/// Health check
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}
