//! Job entity model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fileflow_core::types::id::JobId;

use super::state::JobState;

/// A unit of deferred work held by the job store.
///
/// The payload is opaque to the queue; only the processing function
/// interprets it. `error` is set if and only if `state` is `Failed`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job identifier, assigned at enqueue time.
    pub id: JobId,
    /// Queue name.
    pub queue: String,
    /// Job-specific payload (JSON).
    pub payload: serde_json::Value,
    /// Current lifecycle state.
    pub state: JobState,
    /// Number of processing attempts started so far.
    pub attempts: u32,
    /// Attempt budget for this job.
    pub max_attempts: u32,
    /// When the job was enqueued.
    pub created_at: DateTime<Utc>,
    /// When the current (or last) attempt was claimed.
    pub started_at: Option<DateTime<Utc>>,
    /// When the job reached a terminal state.
    pub finished_at: Option<DateTime<Utc>>,
    /// Earliest time a pending job may be claimed.
    pub available_at: DateTime<Utc>,
    /// Lease deadline while the job is active.
    pub visible_until: Option<DateTime<Utc>>,
    /// Worker holding the current lease.
    pub worker_id: Option<String>,
    /// Terminal failure description.
    pub error: Option<String>,
    /// Error of the most recent failed attempt.
    pub last_error: Option<String>,
    /// Cancellation requested while the job was active.
    pub cancel_reason: Option<String>,
}

impl Job {
    /// Build a fresh pending job with a new identifier.
    pub fn new(queue: impl Into<String>, payload: serde_json::Value, max_attempts: u32) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            queue: queue.into(),
            payload,
            state: JobState::Pending,
            attempts: 0,
            max_attempts: max_attempts.max(1),
            created_at: now,
            started_at: None,
            finished_at: None,
            available_at: now,
            visible_until: None,
            worker_id: None,
            error: None,
            last_error: None,
            cancel_reason: None,
        }
    }

    /// Check if the attempt budget allows another attempt.
    pub fn has_attempts_left(&self) -> bool {
        self.attempts < self.max_attempts
    }

    /// Check if the job is in a terminal state.
    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// Whether a pending job may be claimed at `now`.
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Pending && self.available_at <= now
    }

    /// Whether an active job's lease has run out at `now`.
    pub fn lease_expired(&self, now: DateTime<Utc>) -> bool {
        self.state == JobState::Active && self.visible_until.is_some_and(|until| until <= now)
    }

    /// Milliseconds between enqueue and completion, if finished.
    pub fn latency_ms(&self) -> Option<i64> {
        self.finished_at
            .map(|finished| (finished - self.created_at).num_milliseconds())
    }
}
