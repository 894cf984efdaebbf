//! Job outcome events.

use serde::{Deserialize, Serialize};

use crate::types::id::JobId;

/// Outcome of a processing attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum JobEvent {
    /// The job reached `completed`.
    Completed {
        /// The job ID.
        job_id: JobId,
        /// Queue the job ran on.
        queue: String,
        /// Attempts used, including the successful one.
        attempts: u32,
        /// Time from enqueue to completion in milliseconds.
        latency_ms: i64,
    },
    /// The job reached `failed` and will not run again.
    Failed {
        /// The job ID.
        job_id: JobId,
        /// Queue the job ran on.
        queue: String,
        /// Attempts used.
        attempts: u32,
        /// Failure description stored on the job.
        error: String,
    },
    /// An attempt failed and the job was scheduled for another one.
    Retrying {
        /// The job ID.
        job_id: JobId,
        /// Queue the job runs on.
        queue: String,
        /// Attempts used so far.
        attempts: u32,
        /// Error of the failed attempt.
        error: String,
        /// Delay before the job becomes claimable again.
        retry_in_ms: u64,
    },
}

impl JobEvent {
    /// The job this event refers to.
    pub fn job_id(&self) -> JobId {
        match self {
            Self::Completed { job_id, .. }
            | Self::Failed { job_id, .. }
            | Self::Retrying { job_id, .. } => *job_id,
        }
    }

    /// The queue this event was emitted on.
    pub fn queue(&self) -> &str {
        match self {
            Self::Completed { queue, .. }
            | Self::Failed { queue, .. }
            | Self::Retrying { queue, .. } => queue,
        }
    }

    /// Short lowercase name of the event kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::Retrying { .. } => "retrying",
        }
    }
}
