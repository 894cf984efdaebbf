//! Job status and cancellation handlers.

use axum::Json;
use axum::body::Bytes;
use axum::extract::{Path, State};

use fileflow_broker::CancelOutcome;
use fileflow_core::error::AppError;
use fileflow_core::types::id::JobId;

use crate::dto::request::CancelJobRequest;
use crate::dto::response::{ApiResponse, CancelJobResponse, JobStatusResponse};
use crate::error::ApiError;
use crate::state::AppState;

const DEFAULT_CANCEL_REASON: &str = "cancelled by request";

/// GET /api/jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> Result<Json<ApiResponse<JobStatusResponse>>, ApiError> {
    let job = state.producer.status(job_id).await?;
    Ok(Json(ApiResponse::ok(job.into())))
}

/// POST /api/jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    body: Bytes,
) -> Result<Json<ApiResponse<CancelJobResponse>>, ApiError> {
    let request: CancelJobRequest = if body.is_empty() {
        CancelJobRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| AppError::validation(format!("Invalid cancel request: {e}")))?
    };
    let reason = request
        .reason
        .filter(|r| !r.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_CANCEL_REASON.to_string());

    let (job, outcome) = match state.producer.cancel(job_id, &reason).await? {
        CancelOutcome::Cancelled(job) => (job, "cancelled"),
        CancelOutcome::Requested(job) => (job, "cancellation_requested"),
    };

    Ok(Json(ApiResponse::ok(CancelJobResponse {
        job_id: job.id,
        state: job.state,
        outcome: outcome.to_string(),
    })))
}
