//! Stale-job sweeper.
//!
//! Reclaims jobs whose lease expired (their worker crashed or stalled) and,
//! when a retention period is configured, purges old finished jobs. Runs as a
//! repeated job on a `tokio-cron-scheduler` scheduler.

use std::sync::Arc;
use std::time::Duration;

use chrono::{TimeDelta, Utc};
use tokio::sync::RwLock;
use tokio_cron_scheduler::{Job as CronJob, JobScheduler};

use fileflow_broker::{BrokerManager, JobStore, ReclaimOutcome};
use fileflow_core::error::AppError;
use fileflow_core::events::JobEvent;
use fileflow_core::result::AppResult;
use fileflow_notify::EventNotifier;

/// Counts from one sweep.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    /// Jobs returned to `pending`.
    pub requeued: usize,
    /// Jobs marked `failed`.
    pub failed: usize,
    /// Finished jobs deleted.
    pub purged: u64,
}

/// Reclaims stale jobs on one queue.
#[derive(Debug, Clone)]
pub struct StaleJobSweeper {
    store: BrokerManager,
    notifier: EventNotifier,
    queue: String,
    retention: Option<Duration>,
}

impl StaleJobSweeper {
    /// Create a sweeper for `queue`.
    pub fn new(store: BrokerManager, notifier: EventNotifier, queue: impl Into<String>) -> Self {
        Self {
            store,
            notifier,
            queue: queue.into(),
            retention: None,
        }
    }

    /// Purge finished jobs older than `retention` on every sweep.
    pub fn with_retention(mut self, retention: Option<Duration>) -> Self {
        self.retention = retention;
        self
    }

    /// Run one sweep now.
    pub async fn sweep_once(&self) -> AppResult<SweepReport> {
        let now = Utc::now();
        let mut report = SweepReport::default();

        for reclaimed in self.store.reclaim_stale(&self.queue, now).await? {
            let job = reclaimed.job;
            match reclaimed.outcome {
                ReclaimOutcome::Requeued => {
                    report.requeued += 1;
                    tracing::warn!(
                        job_id = %job.id,
                        queue = %job.queue,
                        attempt = job.attempts,
                        "Reclaimed job with expired lease"
                    );
                }
                ReclaimOutcome::Failed => {
                    report.failed += 1;
                    let error = job.error.clone().unwrap_or_default();
                    tracing::warn!(
                        job_id = %job.id,
                        queue = %job.queue,
                        error = %error,
                        "Stale job failed"
                    );
                    self.notifier.publish(JobEvent::Failed {
                        job_id: job.id,
                        queue: job.queue.clone(),
                        attempts: job.attempts,
                        error,
                    });
                }
            }
        }

        if let Some(retention) = self.retention {
            let cutoff = TimeDelta::from_std(retention)
                .ok()
                .and_then(|delta| now.checked_sub_signed(delta));
            if let Some(cutoff) = cutoff {
                report.purged = self.store.purge_finished(&self.queue, cutoff).await?;
            }
        }

        if report != SweepReport::default() {
            tracing::info!(
                queue = %self.queue,
                requeued = report.requeued,
                failed = report.failed,
                purged = report.purged,
                "Sweep finished"
            );
        }
        Ok(report)
    }

    /// Schedule [`sweep_once`](Self::sweep_once) every `interval`.
    ///
    /// The schedule reads the sweeper from a slot that
    /// [`SweeperHandle::shutdown`] empties, so the sweeper's notifier clone is
    /// released as soon as the schedule stops.
    pub async fn start(self, interval: Duration) -> AppResult<SweeperHandle> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|e| AppError::internal(format!("Failed to create scheduler: {e}")))?;

        let queue = self.queue.clone();
        let slot = Arc::new(RwLock::new(Some(self)));
        let scheduled = Arc::clone(&slot);
        let job = CronJob::new_repeated_async(interval, move |_uuid, _lock| {
            let slot = Arc::clone(&scheduled);
            Box::pin(async move {
                let Some(sweeper) = slot.read().await.clone() else {
                    return;
                };
                if let Err(e) = sweeper.sweep_once().await {
                    tracing::error!(queue = %sweeper.queue, error = %e, "Stale job sweep failed");
                }
            })
        })
        .map_err(|e| AppError::internal(format!("Failed to create sweep schedule: {e}")))?;

        scheduler
            .add(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to add sweep schedule: {e}")))?;
        scheduler
            .start()
            .await
            .map_err(|e| AppError::internal(format!("Failed to start scheduler: {e}")))?;

        tracing::info!(
            queue = %queue,
            interval_secs = interval.as_secs(),
            "Stale job sweeper started"
        );
        Ok(SweeperHandle { scheduler, slot })
    }
}

/// Running sweeper schedule.
pub struct SweeperHandle {
    scheduler: JobScheduler,
    /// Sweeper used by the schedule; `None` once shut down.
    slot: Arc<RwLock<Option<StaleJobSweeper>>>,
}

impl std::fmt::Debug for SweeperHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SweeperHandle").finish()
    }
}

impl SweeperHandle {
    /// Stop the schedule and release the sweeper it was running.
    pub async fn shutdown(mut self) -> AppResult<()> {
        self.slot.write().await.take();
        self.scheduler
            .shutdown()
            .await
            .map_err(|e| AppError::internal(format!("Failed to shutdown scheduler: {e}")))?;
        tracing::info!("Stale job sweeper stopped");
        Ok(())
    }
}
