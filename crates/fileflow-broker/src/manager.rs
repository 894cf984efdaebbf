//! Broker manager that dispatches to the configured job store provider.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::info;

use fileflow_core::config::BrokerConfig;
use fileflow_core::error::AppError;
use fileflow_core::result::AppResult;
use fileflow_core::types::id::JobId;
use fileflow_entity::job::Job;

use crate::store::{CancelOutcome, JobStore, QueueStats, Reclaimed};

/// Job store handle shared by producers, workers and the sweeper.
///
/// The provider is selected at construction time based on configuration.
#[derive(Debug, Clone)]
pub struct BrokerManager {
    /// The inner job store.
    inner: Arc<dyn JobStore>,
}

impl BrokerManager {
    /// Create a new broker from configuration.
    pub async fn new(config: &BrokerConfig) -> AppResult<Self> {
        let inner: Arc<dyn JobStore> = match config.provider.as_str() {
            #[cfg(feature = "redis-backend")]
            "redis" => {
                info!("Initializing Redis job store");
                let client = crate::redis::RedisClient::connect(&config.redis).await?;
                Arc::new(crate::redis::RedisJobStore::new(client))
            }
            #[cfg(feature = "memory")]
            "memory" => {
                info!("Initializing in-memory job store (not durable)");
                Arc::new(crate::memory::MemoryJobStore::new())
            }
            other => {
                return Err(AppError::configuration(format!(
                    "Unknown broker provider: '{other}'. Supported: memory, redis"
                )));
            }
        };

        Ok(Self { inner })
    }

    /// Create a broker from an existing store (for testing).
    pub fn from_store(store: Arc<dyn JobStore>) -> Self {
        Self { inner: store }
    }

    /// Get a reference to the inner store.
    pub fn store(&self) -> &dyn JobStore {
        self.inner.as_ref()
    }
}

#[async_trait]
impl JobStore for BrokerManager {
    async fn enqueue(
        &self,
        queue: &str,
        payload: serde_json::Value,
        max_attempts: u32,
    ) -> AppResult<Job> {
        self.inner.enqueue(queue, payload, max_attempts).await
    }

    async fn dequeue(
        &self,
        queue: &str,
        worker_id: &str,
        visibility_timeout: Duration,
    ) -> AppResult<Option<Job>> {
        self.inner
            .dequeue(queue, worker_id, visibility_timeout)
            .await
    }

    async fn complete(&self, job_id: JobId, worker_id: &str) -> AppResult<Job> {
        self.inner.complete(job_id, worker_id).await
    }

    async fn fail(&self, job_id: JobId, worker_id: &str, error: &str) -> AppResult<Job> {
        self.inner.fail(job_id, worker_id, error).await
    }

    async fn retry(
        &self,
        job_id: JobId,
        worker_id: &str,
        error: &str,
        delay: Duration,
    ) -> AppResult<Job> {
        self.inner.retry(job_id, worker_id, error, delay).await
    }

    async fn extend_visibility(
        &self,
        job_id: JobId,
        worker_id: &str,
        timeout: Duration,
    ) -> AppResult<bool> {
        self.inner
            .extend_visibility(job_id, worker_id, timeout)
            .await
    }

    async fn reclaim_stale(&self, queue: &str, now: DateTime<Utc>) -> AppResult<Vec<Reclaimed>> {
        self.inner.reclaim_stale(queue, now).await
    }

    async fn cancel(&self, job_id: JobId, reason: &str) -> AppResult<CancelOutcome> {
        self.inner.cancel(job_id, reason).await
    }

    async fn get(&self, job_id: JobId) -> AppResult<Job> {
        self.inner.get(job_id).await
    }

    async fn stats(&self, queue: &str) -> AppResult<QueueStats> {
        self.inner.stats(queue).await
    }

    async fn purge_finished(&self, queue: &str, older_than: DateTime<Utc>) -> AppResult<u64> {
        self.inner.purge_finished(queue, older_than).await
    }

    async fn health_check(&self) -> AppResult<bool> {
        self.inner.health_check().await
    }
}
