//! Job store trait for pluggable broker backends.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fileflow_core::result::AppResult;
use fileflow_core::types::id::JobId;
use fileflow_entity::job::Job;

/// Durable, ordered, at-least-once holding area for jobs, scoped by queue.
///
/// Every mutation of job state goes through these operations. Implementations
/// must make each of them atomic with respect to concurrent callers, in
/// particular `dequeue` must never hand the same job to two callers.
#[async_trait]
pub trait JobStore: Send + Sync + std::fmt::Debug + 'static {
    /// Append a new `Pending` job. Fails with `ServiceUnavailable` when the
    /// backend cannot be reached.
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> AppResult<Job>;

    /// Claim one due `Pending` job, moving it to `Active` with a lease of
    /// `visibility_timeout`. Returns `None` when nothing is due.
    async fn dequeue(
        &self,
        queue: &str,
        worker_id: &str,
        visibility_timeout: Duration,
    ) -> AppResult<Option<Job>>;

    /// Move an `Active` job held by `worker_id` to `Completed`.
    ///
    /// Settling a job whose lease now belongs to another worker fails with
    /// `Conflict`, as does settling a job that is not `Active`.
    async fn complete(&self, job_id: JobId, worker_id: &str) -> AppResult<Job>;

    /// Move an `Active` job held by `worker_id` to `Failed` with the given
    /// description.
    async fn fail(&self, job_id: JobId, worker_id: &str, error: &str) -> AppResult<Job>;

    /// Return an `Active` job held by `worker_id` to `Pending`, claimable
    /// again after `delay`.
    ///
    /// When a cancellation was requested while the job ran, the job becomes
    /// `Failed` with the cancellation reason instead. Callers tell the two
    /// apart by the state of the returned job.
    async fn retry(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        delay: Duration,
    ) -> AppResult<Job>;

    /// Push the lease of a job still held by `worker_id` forward. Returns
    /// `false` when the job is no longer held by that worker.
    async fn extend_visibility(
        &self,
        job_id: JobId,
        worker_id: &str,
        timeout: Duration,
    ) -> AppResult<bool>;

    /// Release every `Active` job whose lease ended before `now`.
    ///
    /// Jobs with attempts left go back to `Pending`; jobs whose budget is
    /// spent or whose cancellation was requested become `Failed`.
    async fn reclaim_stale(&self, queue: &str, now: DateTime<Utc>) -> AppResult<Vec<Reclaimed>>;

    /// Cancel a job. Pending jobs fail immediately; active jobs are marked
    /// and fail once their lease expires.
    async fn cancel(&self, job_id: JobId, reason: &str) -> AppResult<CancelOutcome>;

    /// Fetch a job by id.
    async fn get(&self, job_id: JobId) -> AppResult<Job>;

    /// Count jobs per state on a queue.
    async fn stats(&self, queue: &str) -> AppResult<QueueStats>;

    /// Delete terminal jobs that finished before `older_than`.
    async fn purge_finished(&self, queue: &str, older_than: DateTime<Utc>) -> AppResult<u64>;

    /// Check that the backend is reachable.
    async fn health_check(&self) -> AppResult<bool>;
}

/// A job released by [`JobStore::reclaim_stale`].
#[derive(Debug, Clone)]
pub struct Reclaimed {
    /// The job after reclamation.
    pub job: Job,
    /// What happened to it.
    pub outcome: ReclaimOutcome,
}

/// Result of reclaiming one stale job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// Returned to `Pending` for redelivery.
    Requeued,
    /// Marked `Failed` (budget spent or cancellation requested).
    Failed,
}

/// Result of [`JobStore::cancel`].
#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    /// The job was pending and is now failed.
    Cancelled(Job),
    /// The job is active; it fails when its lease expires.
    Requested(Job),
}

/// Queue statistics.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueStats {
    /// Queue name.
    pub queue: String,
    /// Jobs waiting to be claimed (including delayed retries).
    pub pending: u64,
    /// Jobs currently held by a worker.
    pub active: u64,
    /// Jobs completed and not yet purged.
    pub completed: u64,
    /// Jobs failed and not yet purged.
    pub failed: u64,
}

/// Failure description recorded when a lease runs out.
pub const LEASE_EXPIRED_ERROR: &str = "visibility timeout expired";

/// `now + duration`, saturating at the largest representable time.
pub(crate) fn deadline(now: DateTime<Utc>, duration: Duration) -> DateTime<Utc> {
    chrono::TimeDelta::from_std(duration)
        .ok()
        .and_then(|delta| now.checked_add_signed(delta))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
