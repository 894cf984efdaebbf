//! Route definitions for the FileFlow HTTP API.
//!
//! All routes are mounted under `/api`.

use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware as axum_middleware,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::middleware;
use crate::state::AppState;

/// Build the complete Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let body_limit = state.config.server.request_body_limit_bytes;

    let api_routes = Router::new()
        .merge(upload_routes())
        .merge(job_routes())
        .merge(queue_routes())
        .merge(health_routes());

    Router::new()
        .nest("/api", api_routes)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .layer(axum_middleware::from_fn(middleware::logging::request_logging))
        .with_state(state)
}

/// Upload acceptance
fn upload_routes() -> Router<AppState> {
    Router::new().route("/uploads", post(handlers::upload::accept_upload))
}

/// Job status and cancellation
fn job_routes() -> Router<AppState> {
    Router::new()
        .route("/jobs/{id}", get(handlers::job::get_job))
        .route("/jobs/{id}/cancel", post(handlers::job::cancel_job))
}

/// Queue statistics
fn queue_routes() -> Router<AppState> {
    Router::new().route("/queues/stats", get(handlers::queue::queue_stats))
}

/// Health check
fn health_routes() -> Router<AppState> {
    Router::new().route("/health", get(handlers::health::health))
}
