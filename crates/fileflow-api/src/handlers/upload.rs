//! Upload acceptance handler.

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::dto::response::{ApiResponse, UploadAcceptedResponse};
use crate::error::ApiError;
use crate::state::AppState;

/// POST /api/uploads
///
/// Enqueues the descriptor and answers `202 Accepted` without waiting for
/// processing. Processing failures are only visible through the job status.
pub async fn accept_upload(
    State(state): State<AppState>,
    Json(descriptor): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<ApiResponse<UploadAcceptedResponse>>), ApiError> {
    let job = state.producer.submit_payload(&descriptor).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(UploadAcceptedResponse {
            job_id: job.id,
            state: job.state,
        })),
    ))
}
