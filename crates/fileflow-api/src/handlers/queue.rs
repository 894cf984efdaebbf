//! Queue statistics handler.

use axum::Json;
use axum::extract::State;

use crate::dto::response::{ApiResponse, QueueStatsResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// GET /api/queues/stats
pub async fn queue_stats(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<QueueStatsResponse>>, ApiError> {
    let stats = state.producer.stats().await?;
    Ok(Json(ApiResponse::ok(QueueStatsResponse {
        stats,
        metrics: state.metrics.snapshot(),
    })))
}
