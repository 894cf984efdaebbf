//! Access logging for API requests.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;

/// Health checks are polled constantly; keep them out of the info log.
const HEALTH_ROUTE: &str = "/api/health";

/// Logs each request with its status and latency.
///
/// Server errors log at `error`, client errors at `warn`.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let status = response.status();
    let latency_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(%method, %path, status = status.as_u16(), latency_ms, "API request failed");
    } else if status.is_client_error() {
        tracing::warn!(%method, %path, status = status.as_u16(), latency_ms, "API request rejected");
    } else if path == HEALTH_ROUTE {
        tracing::debug!(%method, %path, status = status.as_u16(), latency_ms, "Health check");
    } else {
        tracing::info!(%method, %path, status = status.as_u16(), latency_ms, "API request");
    }

    response
}
