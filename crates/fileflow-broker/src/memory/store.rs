//! In-memory job store guarded by a single async mutex.
//!
//! Every operation takes the lock for its whole duration, which makes each
//! of them atomic. Nothing survives a restart.

use std::collections::{HashMap, VecDeque};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tracing::debug;

use fileflow_core::error::AppError;
use fileflow_core::result::AppResult;
use fileflow_core::types::id::JobId;
use fileflow_entity::job::{Job, JobState};

use crate::store::{
    deadline, CancelOutcome, JobStore, QueueStats, ReclaimOutcome, Reclaimed, LEASE_EXPIRED_ERROR,
};

#[derive(Debug, Default)]
struct MemoryState {
    /// Every job ever enqueued, until purged.
    jobs: HashMap<JobId, Job>,
    /// Queue name → pending job ids in claim order.
    pending: HashMap<String, VecDeque<JobId>>,
}

impl MemoryState {
    fn job_mut(&mut self, job_id: JobId) -> AppResult<&mut Job> {
        self.jobs
            .get_mut(&job_id)
            .ok_or_else(|| AppError::job_not_found(job_id))
    }

    fn push_pending(&mut self, queue: &str, job_id: JobId) {
        self.pending
            .entry(queue.to_string())
            .or_default()
            .push_back(job_id);
    }

    fn remove_pending(&mut self, queue: &str, job_id: JobId) {
        if let Some(ids) = self.pending.get_mut(queue) {
            ids.retain(|id| *id != job_id);
        }
    }
}

/// Active job whose lease must still belong to `worker_id`.
fn require_held(job: &Job, worker_id: &str, to: JobState) -> AppResult<()> {
    if job.state != JobState::Active {
        return Err(AppError::invalid_transition(job.id, job.state, to));
    }
    if job.worker_id.as_deref() != Some(worker_id) {
        let holder = job.worker_id.as_deref().unwrap_or("nobody");
        return Err(AppError::invalid_transition(
            job.id,
            format!("{} (leased to {holder}, not {worker_id})", job.state),
            to,
        ));
    }
    Ok(())
}

/// Settle a job as `Failed`, releasing its lease.
fn mark_failed(job: &mut Job, error: &str, last_error: &str, now: DateTime<Utc>) {
    job.state = JobState::Failed;
    job.error = Some(error.to_string());
    job.last_error = Some(last_error.to_string());
    job.finished_at = Some(now);
    job.visible_until = None;
    job.worker_id = None;
}

/// In-memory job store provider.
#[derive(Debug, Default)]
pub struct MemoryJobStore {
    state: Mutex<MemoryState>,
}

impl MemoryJobStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> AppResult<Job> {
        let job = Job::new(queue, payload, max_attempts);
        let mut state = self.state.lock().await;
        state.push_pending(queue, job.id);
        state.jobs.insert(job.id, job.clone());
        debug!(job_id = %job.id, queue, "Enqueued job");
        Ok(job)
    }

    async fn dequeue(
        &self,
        queue: &str,
        worker_id: &str,
        visibility_timeout: Duration,
    ) -> AppResult<Option<Job>> {
        let now = Utc::now();
        let mut guard = self.state.lock().await;
        let state = &mut *guard;

        let Some(ids) = state.pending.get_mut(queue) else {
            return Ok(None);
        };
        let position = ids
            .iter()
            .position(|id| state.jobs.get(id).is_some_and(|job| job.is_due(now)));
        let Some(job_id) = position.and_then(|pos| ids.remove(pos)) else {
            return Ok(None);
        };

        let job = state.job_mut(job_id)?;
        job.state = JobState::Active;
        job.attempts += 1;
        job.started_at = Some(now);
        job.visible_until = Some(deadline(now, visibility_timeout));
        job.worker_id = Some(worker_id.to_string());

        debug!(job_id = %job.id, queue, worker_id, attempt = job.attempts, "Dequeued job");
        Ok(Some(job.clone()))
    }

    async fn complete(&self, job_id: JobId, worker_id: &str) -> AppResult<Job> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(job_id)?;
        require_held(job, worker_id, JobState::Completed)?;
        job.state = JobState::Completed;
        job.finished_at = Some(Utc::now());
        job.visible_until = None;
        job.worker_id = None;
        Ok(job.clone())
    }

    async fn fail(&self, job_id: JobId, worker_id: &str, error: &str) -> AppResult<Job> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(job_id)?;
        require_held(job, worker_id, JobState::Failed)?;
        mark_failed(job, error, error, Utc::now());
        Ok(job.clone())
    }

    async fn retry(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        delay: Duration,
    ) -> AppResult<Job> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(job_id)?;
        require_held(job, worker_id, JobState::Pending)?;
        if let Some(reason) = job.cancel_reason.clone() {
            mark_failed(job, &reason, error, Utc::now());
            debug!(job_id = %job.id, "Cancelled job failed instead of retrying");
            return Ok(job.clone());
        }
        job.state = JobState::Pending;
        job.last_error = Some(error.to_string());
        job.available_at = deadline(Utc::now(), delay);
        job.visible_until = None;
        job.worker_id = None;
        let job = job.clone();
        state.push_pending(&job.queue, job.id);
        Ok(job)
    }

    async fn extend_visibility(
        &self,
        job_id: JobId,
        worker_id: &str,
        timeout: Duration,
    ) -> AppResult<bool> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(job_id)?;
        if job.state != JobState::Active || job.worker_id.as_deref() != Some(worker_id) {
            return Ok(false);
        }
        job.visible_until = Some(deadline(Utc::now(), timeout));
        Ok(true)
    }

    async fn reclaim_stale(&self, queue: &str, now: DateTime<Utc>) -> AppResult<Vec<Reclaimed>> {
        let mut state = self.state.lock().await;
        let stale: Vec<JobId> = state
            .jobs
            .values()
            .filter(|job| job.queue == queue && job.lease_expired(now))
            .map(|job| job.id)
            .collect();

        let mut reclaimed = Vec::with_capacity(stale.len());
        for job_id in stale {
            let job = state.job_mut(job_id)?;
            job.visible_until = None;
            job.worker_id = None;

            let outcome = if job.cancel_reason.is_some() || !job.has_attempts_left() {
                let reason = job
                    .cancel_reason
                    .clone()
                    .unwrap_or_else(|| LEASE_EXPIRED_ERROR.to_string());
                mark_failed(job, &reason, &reason, now);
                ReclaimOutcome::Failed
            } else {
                job.state = JobState::Pending;
                job.last_error = Some(LEASE_EXPIRED_ERROR.to_string());
                job.available_at = now;
                ReclaimOutcome::Requeued
            };

            let job = job.clone();
            if outcome == ReclaimOutcome::Requeued {
                state.push_pending(queue, job.id);
            }
            reclaimed.push(Reclaimed { job, outcome });
        }

        Ok(reclaimed)
    }

    async fn cancel(&self, job_id: JobId, reason: &str) -> AppResult<CancelOutcome> {
        let mut state = self.state.lock().await;
        let job = state.job_mut(job_id)?;
        match job.state {
            JobState::Pending => {
                job.state = JobState::Failed;
                job.error = Some(reason.to_string());
                job.finished_at = Some(Utc::now());
                let job = job.clone();
                state.remove_pending(&job.queue, job.id);
                Ok(CancelOutcome::Cancelled(job))
            }
            JobState::Active => {
                job.cancel_reason = Some(reason.to_string());
                Ok(CancelOutcome::Requested(job.clone()))
            }
            terminal => Err(AppError::invalid_transition(
                job_id,
                terminal,
                JobState::Failed,
            )),
        }
    }

    async fn get(&self, job_id: JobId) -> AppResult<Job> {
        let state = self.state.lock().await;
        state
            .jobs
            .get(&job_id)
            .cloned()
            .ok_or_else(|| AppError::job_not_found(job_id))
    }

    async fn stats(&self, queue: &str) -> AppResult<QueueStats> {
        let state = self.state.lock().await;
        let mut stats = QueueStats {
            queue: queue.to_string(),
            ..QueueStats::default()
        };
        for job in state.jobs.values().filter(|job| job.queue == queue) {
            match job.state {
                JobState::Pending => stats.pending += 1,
                JobState::Active => stats.active += 1,
                JobState::Completed => stats.completed += 1,
                JobState::Failed => stats.failed += 1,
            }
        }
        Ok(stats)
    }

    async fn purge_finished(&self, queue: &str, older_than: DateTime<Utc>) -> AppResult<u64> {
        let mut state = self.state.lock().await;
        let before = state.jobs.len();
        state.jobs.retain(|_, job| {
            !(job.queue == queue
                && job.is_terminal()
                && job.finished_at.is_some_and(|finished| finished < older_than))
        });
        Ok((before - state.jobs.len()) as u64)
    }

    async fn health_check(&self) -> AppResult<bool> {
        Ok(true)
    }
}
