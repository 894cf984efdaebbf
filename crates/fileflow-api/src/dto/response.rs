//! Response DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fileflow_broker::QueueStats;
use fileflow_core::types::id::JobId;
use fileflow_entity::job::{Job, JobState};
use fileflow_notify::observers::MetricsSnapshot;

/// Standard success response wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T: Serialize> {
    /// Whether the request was successful.
    pub success: bool,
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Creates a successful response.
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data,
        }
    }
}

/// Reply to an accepted upload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadAcceptedResponse {
    /// Job created for the upload.
    pub job_id: JobId,
    /// Always `pending` at acceptance.
    pub state: JobState,
}

/// Job status as seen by clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobStatusResponse {
    /// Job ID.
    pub id: JobId,
    /// Queue name.
    pub queue: String,
    /// Lifecycle state.
    pub state: JobState,
    /// Attempts started.
    pub attempts: u32,
    /// Attempt budget.
    pub max_attempts: u32,
    /// Terminal failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Error of the most recent failed attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_error: Option<String>,
    /// Enqueue time.
    pub created_at: DateTime<Utc>,
    /// Start of the latest attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    /// Time the job reached a terminal state.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl From<Job> for JobStatusResponse {
    fn from(job: Job) -> Self {
        Self {
            id: job.id,
            queue: job.queue,
            state: job.state,
            attempts: job.attempts,
            max_attempts: job.max_attempts,
            error: job.error,
            last_error: job.last_error,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

/// Reply to a cancellation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelJobResponse {
    /// The job.
    pub job_id: JobId,
    /// State after the call.
    pub state: JobState,
    /// `cancelled` for pending jobs, `cancellation_requested` for active ones.
    pub outcome: String,
}

/// Queue counters plus in-process outcome metrics.
#[derive(Debug, Clone, Serialize)]
pub struct QueueStatsResponse {
    /// Per-state counts from the job store.
    pub stats: QueueStats,
    /// Outcomes observed by this process.
    pub metrics: MetricsSnapshot,
}

/// Health check reply.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    /// `ok` or `unavailable`.
    pub status: String,
    /// Crate version.
    pub version: String,
    /// Seconds since start.
    pub uptime_seconds: u64,
    /// Whether the job store answered.
    pub store: String,
}
