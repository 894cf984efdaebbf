//! Redis-backed job store.
//!
//! Job records live in hashes; queue membership lives in one list and four
//! sorted sets per queue (see [`crate::keys`]). Each state transition runs as
//! a single Lua script, so concurrent workers and sweepers never observe a
//! half-applied change.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

use fileflow_core::error::AppError;
use fileflow_core::result::AppResult;
use fileflow_core::types::id::JobId;
use fileflow_entity::job::{Job, JobState};

use super::client::RedisClient;
use super::codec::{self, millis};
use super::scripts;
use crate::keys;
use crate::store::{
    deadline, CancelOutcome, JobStore, QueueStats, ReclaimOutcome, Reclaimed, LEASE_EXPIRED_ERROR,
};

/// Redis-backed job store provider.
#[derive(Debug, Clone)]
pub struct RedisJobStore {
    /// Redis client.
    client: RedisClient,
}

impl RedisJobStore {
    /// Create a new Redis job store.
    pub fn new(client: RedisClient) -> Self {
        Self { client }
    }

    /// Map a Redis error to an AppError.
    fn map_err(e: redis::RedisError) -> AppError {
        AppError::store_unavailable(format!("Redis error: {e}"), e)
    }

    fn key(&self, relative: &str) -> String {
        self.client.prefixed_key(relative)
    }

    fn job_prefix(&self) -> String {
        self.client.prefixed_key(keys::JOB_PREFIX)
    }

    /// Load a full job record.
    async fn load(&self, job_id: JobId) -> AppResult<Job> {
        let mut conn = self.client.conn_mut();
        let fields: HashMap<String, String> = redis::cmd("HGETALL")
            .arg(self.key(&keys::job(job_id)))
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if fields.is_empty() {
            return Err(AppError::job_not_found(job_id));
        }
        codec::from_fields(&fields)
    }

    /// Resolve the queue a job belongs to, needed to address its queue keys.
    async fn queue_of(&self, job_id: JobId) -> AppResult<String> {
        let mut conn = self.client.conn_mut();
        let queue: Option<String> = redis::cmd("HGET")
            .arg(self.key(&keys::job(job_id)))
            .arg("queue")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        queue.ok_or_else(|| AppError::job_not_found(job_id))
    }

    /// Turn a script status reply into a result.
    fn check_status(job_id: JobId, status: &str, to: JobState, worker_id: &str) -> AppResult<()> {
        if status == "OK" {
            return Ok(());
        }
        if status == "NOT_FOUND" {
            return Err(AppError::job_not_found(job_id));
        }
        if let Some(from) = status.strip_prefix("INVALID:") {
            return Err(AppError::invalid_transition(job_id, from, to));
        }
        if let Some(holder) = status.strip_prefix("LEASE_LOST:") {
            let holder = if holder.is_empty() { "nobody" } else { holder };
            return Err(AppError::invalid_transition(
                job_id,
                format!("active (leased to {holder}, not {worker_id})"),
                to,
            ));
        }
        Err(AppError::internal(format!(
            "Unexpected job store reply '{status}' for job {job_id}"
        )))
    }

    /// Move an active job held by `worker_id` to a terminal state.
    async fn finish(
        &self,
        job_id: JobId,
        worker_id: &str,
        to: JobState,
        error: Option<&str>,
    ) -> AppResult<Job> {
        let queue = self.queue_of(job_id).await?;
        let target = match to {
            JobState::Completed => keys::completed(&queue),
            _ => keys::failed(&queue),
        };

        let mut conn = self.client.conn_mut();
        let status: String = scripts::FINISH
            .key(self.key(&keys::job(job_id)))
            .key(self.key(&keys::active(&queue)))
            .key(self.key(&target))
            .arg(to.as_str())
            .arg(millis(Utc::now()))
            .arg(error.unwrap_or(""))
            .arg(job_id.to_string())
            .arg(worker_id)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        Self::check_status(job_id, &status, to, worker_id)?;
        self.load(job_id).await
    }
}

#[async_trait]
impl JobStore for RedisJobStore {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> AppResult<Job> {
        let job = Job::new(queue, payload, max_attempts);
        let fields = codec::to_fields(&job)?;

        let mut conn = self.client.conn_mut();
        let _: () = redis::pipe()
            .atomic()
            .cmd("HSET")
            .arg(self.key(&keys::job(job.id)))
            .arg(&fields)
            .ignore()
            .cmd("LPUSH")
            .arg(self.key(&keys::pending(queue)))
            .arg(job.id.to_string())
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

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
        let mut conn = self.client.conn_mut();
        let claimed: Option<String> = scripts::DEQUEUE
            .key(self.key(&keys::pending(queue)))
            .key(self.key(&keys::delayed(queue)))
            .key(self.key(&keys::active(queue)))
            .arg(millis(now))
            .arg(millis(deadline(now, visibility_timeout)))
            .arg(worker_id)
            .arg(self.job_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        let Some(raw_id) = claimed else {
            return Ok(None);
        };
        let job_id: JobId = raw_id
            .parse()
            .map_err(|_| AppError::internal(format!("Invalid job id in queue: {raw_id}")))?;

        let job = self.load(job_id).await?;
        debug!(job_id = %job.id, queue, worker_id, attempt = job.attempts, "Dequeued job");
        Ok(Some(job))
    }

    async fn complete(&self, job_id: JobId, worker_id: &str) -> AppResult<Job> {
        self.finish(job_id, worker_id, JobState::Completed, None).await
    }

    async fn fail(&self, job_id: JobId, worker_id: &str, error: &str) -> AppResult<Job> {
        self.finish(job_id, worker_id, JobState::Failed, Some(error))
            .await
    }

    async fn retry(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        delay: Duration,
    ) -> AppResult<Job> {
        let queue = self.queue_of(job_id).await?;
        let now = Utc::now();

        let mut conn = self.client.conn_mut();
        let status: String = scripts::RETRY
            .key(self.key(&keys::job(job_id)))
            .key(self.key(&keys::active(&queue)))
            .key(self.key(&keys::delayed(&queue)))
            .key(self.key(&keys::pending(&queue)))
            .key(self.key(&keys::failed(&queue)))
            .arg(error)
            .arg(millis(deadline(now, delay)))
            .arg(millis(now))
            .arg(job_id.to_string())
            .arg(worker_id)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        if status == "CANCELLED" {
            debug!(job_id = %job_id, "Cancelled job failed instead of retrying");
        } else {
            Self::check_status(job_id, &status, JobState::Pending, worker_id)?;
        }
        self.load(job_id).await
    }

    async fn extend_visibility(
        &self,
        job_id: JobId,
        worker_id: &str,
        timeout: Duration,
    ) -> AppResult<bool> {
        let queue = self.queue_of(job_id).await?;

        let mut conn = self.client.conn_mut();
        let extended: i64 = scripts::EXTEND
            .key(self.key(&keys::job(job_id)))
            .key(self.key(&keys::active(&queue)))
            .arg(worker_id)
            .arg(millis(deadline(Utc::now(), timeout)))
            .arg(job_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        match extended {
            -1 => Err(AppError::job_not_found(job_id)),
            0 => Ok(false),
            _ => Ok(true),
        }
    }

    async fn reclaim_stale(&self, queue: &str, now: DateTime<Utc>) -> AppResult<Vec<Reclaimed>> {
        let mut conn = self.client.conn_mut();
        let pairs: Vec<String> = scripts::RECLAIM
            .key(self.key(&keys::active(queue)))
            .key(self.key(&keys::pending(queue)))
            .key(self.key(&keys::failed(queue)))
            .arg(millis(now))
            .arg(self.job_prefix())
            .arg(LEASE_EXPIRED_ERROR)
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        let mut reclaimed = Vec::with_capacity(pairs.len() / 2);
        for pair in pairs.chunks_exact(2) {
            let job_id: JobId = pair[0]
                .parse()
                .map_err(|_| AppError::internal(format!("Invalid job id in queue: {}", pair[0])))?;
            let outcome = if pair[1] == "failed" {
                ReclaimOutcome::Failed
            } else {
                ReclaimOutcome::Requeued
            };
            let job = self.load(job_id).await?;
            reclaimed.push(Reclaimed { job, outcome });
        }

        Ok(reclaimed)
    }

    async fn cancel(&self, job_id: JobId, reason: &str) -> AppResult<CancelOutcome> {
        let queue = self.queue_of(job_id).await?;

        let mut conn = self.client.conn_mut();
        let status: String = scripts::CANCEL
            .key(self.key(&keys::job(job_id)))
            .key(self.key(&keys::pending(&queue)))
            .key(self.key(&keys::delayed(&queue)))
            .key(self.key(&keys::failed(&queue)))
            .arg(reason)
            .arg(millis(Utc::now()))
            .arg(job_id.to_string())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        match status.as_str() {
            "CANCELLED" => Ok(CancelOutcome::Cancelled(self.load(job_id).await?)),
            "REQUESTED" => Ok(CancelOutcome::Requested(self.load(job_id).await?)),
            other => {
                Self::check_status(job_id, other, JobState::Failed, "")?;
                Err(AppError::internal(format!(
                    "Unexpected cancel reply for job {job_id}"
                )))
            }
        }
    }

    async fn get(&self, job_id: JobId) -> AppResult<Job> {
        self.load(job_id).await
    }

    async fn stats(&self, queue: &str) -> AppResult<QueueStats> {
        let mut conn = self.client.conn_mut();
        let (pending, delayed, active, completed, failed): (u64, u64, u64, u64, u64) =
            redis::pipe()
                .cmd("LLEN")
                .arg(self.key(&keys::pending(queue)))
                .cmd("ZCARD")
                .arg(self.key(&keys::delayed(queue)))
                .cmd("ZCARD")
                .arg(self.key(&keys::active(queue)))
                .cmd("ZCARD")
                .arg(self.key(&keys::completed(queue)))
                .cmd("ZCARD")
                .arg(self.key(&keys::failed(queue)))
                .query_async(&mut conn)
                .await
                .map_err(Self::map_err)?;

        Ok(QueueStats {
            queue: queue.to_string(),
            pending: pending + delayed,
            active,
            completed,
            failed,
        })
    }

    async fn purge_finished(&self, queue: &str, older_than: DateTime<Utc>) -> AppResult<u64> {
        let mut conn = self.client.conn_mut();
        let removed: u64 = scripts::PURGE
            .key(self.key(&keys::completed(queue)))
            .key(self.key(&keys::failed(queue)))
            .arg(millis(older_than))
            .arg(self.job_prefix())
            .invoke_async(&mut conn)
            .await
            .map_err(Self::map_err)?;

        debug!(queue, removed, "Purged finished jobs");
        Ok(removed)
    }

    async fn health_check(&self) -> AppResult<bool> {
        let mut conn = self.client.conn_mut();
        let pong: String = redis::cmd("PING")
            .query_async(&mut conn)
            .await
            .map_err(Self::map_err)?;
        Ok(pong == "PONG")
    }
}
