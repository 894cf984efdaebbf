//! Worker pool: claims jobs from the store and runs the processor on them.

use std::any::Any;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, watch};
use tokio::task::JoinHandle;

use fileflow_broker::{BrokerManager, JobStore};
use fileflow_core::config::WorkerConfig;
use fileflow_core::error::ErrorKind;
use fileflow_core::events::JobEvent;
use fileflow_core::result::AppResult;
use fileflow_core::types::id::JobId;
use fileflow_entity::job::{Job, JobState};
use fileflow_notify::EventNotifier;

use crate::processor::{JobProcessor, ProcessingError};
use crate::retry::RetryPolicy;

/// How a processing attempt was settled in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobOutcome {
    /// The job is `completed`.
    Completed,
    /// The attempt failed; the job is `pending` again after `delay`.
    Retrying {
        /// Backoff before the next attempt.
        delay: Duration,
        /// Error of the failed attempt.
        error: String,
    },
    /// The job is `failed` for good.
    Failed {
        /// Error recorded on the job.
        error: String,
    },
}

/// A job after its attempt has been settled.
#[derive(Debug, Clone)]
pub struct ProcessedJob {
    /// The job as stored after settlement.
    pub job: Job,
    /// What happened.
    pub outcome: JobOutcome,
}

/// Pool of concurrent workers on one queue
#[derive(Debug)]
pub struct WorkerPool {
    /// Job store to claim from
    store: BrokerManager,
    /// Business logic
    processor: Arc<dyn JobProcessor>,
    /// Outcome events
    notifier: EventNotifier,
    /// Worker configuration
    config: WorkerConfig,
    /// Queue to poll
    queue: String,
    /// Lease owner identity
    worker_id: String,
    /// Retry backoff
    retry: RetryPolicy,
}

impl WorkerPool {
    /// Create a new worker pool
    pub fn new(
        store: BrokerManager,
        processor: Arc<dyn JobProcessor>,
        notifier: EventNotifier,
        config: WorkerConfig,
        queue: impl Into<String>,
    ) -> Self {
        let retry = RetryPolicy::from_config(&config);
        Self {
            store,
            processor,
            notifier,
            config,
            queue: queue.into(),
            worker_id: format!("worker-{}", uuid::Uuid::new_v4().simple()),
            retry,
        }
    }

    /// Override the generated worker identifier
    pub fn with_worker_id(mut self, worker_id: impl Into<String>) -> Self {
        self.worker_id = worker_id.into();
        self
    }

    /// Identifier recorded on claimed jobs
    pub fn worker_id(&self) -> &str {
        &self.worker_id
    }

    fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.config.visibility_timeout_seconds.max(1))
    }

    /// Run until the shutdown signal flips to `true`, then wait up to
    /// `shutdown_timeout_seconds` for in-flight jobs.
    ///
    /// Jobs still running when the wait ends keep their lease; the sweeper
    /// hands them to another worker once it expires.
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        let concurrency = self.config.concurrency.max(1);
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let base_idle = Duration::from_millis(self.config.poll_interval_ms.max(1));
        let max_idle = Duration::from_millis(self.config.max_poll_interval_ms).max(base_idle);
        let mut idle = base_idle;

        tracing::info!(
            worker_id = %self.worker_id,
            queue = %self.queue,
            processor = self.processor.name(),
            concurrency,
            "Worker pool started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let permit = tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
                permit = Arc::clone(&semaphore).acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let claimed = self
                .store
                .dequeue(&self.queue, &self.worker_id, self.visibility_timeout())
                .await;

            match claimed {
                Ok(Some(job)) => {
                    idle = base_idle;
                    let pool = Arc::clone(&self);
                    tokio::spawn(async move {
                        let _permit = permit;
                        let job_id = job.id;
                        if let Err(e) = pool.execute(job).await {
                            if e.kind == ErrorKind::Conflict {
                                tracing::warn!(
                                    job_id = %job_id,
                                    error = %e,
                                    "Lease lost before the attempt was settled"
                                );
                            } else {
                                tracing::error!(
                                    job_id = %job_id,
                                    error = %e,
                                    "Failed to settle job attempt"
                                );
                            }
                        }
                    });
                    continue;
                }
                Ok(None) => {
                    drop(permit);
                    tracing::trace!(queue = %self.queue, "No jobs available");
                }
                Err(e) => {
                    drop(permit);
                    tracing::error!(queue = %self.queue, error = %e, "Failed to dequeue job");
                }
            }

            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = tokio::time::sleep(idle) => {}
            }
            idle = idle.saturating_mul(2).min(max_idle);
        }

        tracing::info!(worker_id = %self.worker_id, "Worker pool waiting for in-flight jobs");

        let wait = Duration::from_secs(self.config.shutdown_timeout_seconds);
        let permits = u32::try_from(concurrency).unwrap_or(u32::MAX);
        match tokio::time::timeout(wait, semaphore.acquire_many(permits)).await {
            Ok(_) => tracing::info!(worker_id = %self.worker_id, "Worker pool shut down"),
            Err(_) => tracing::warn!(
                worker_id = %self.worker_id,
                "Shutdown timeout elapsed with jobs still running; they will be reclaimed"
            ),
        }
    }

    /// Claim and process a single job, if one is due.
    pub async fn process_next(&self) -> AppResult<Option<ProcessedJob>> {
        let claimed = self
            .store
            .dequeue(&self.queue, &self.worker_id, self.visibility_timeout())
            .await?;
        match claimed {
            Some(job) => self.execute(job).await.map(Some),
            None => Ok(None),
        }
    }

    /// Run the processor on a claimed job and settle the attempt.
    async fn execute(&self, job: Job) -> AppResult<ProcessedJob> {
        tracing::info!(
            job_id = %job.id,
            queue = %job.queue,
            worker_id = %self.worker_id,
            attempt = job.attempts,
            max_attempts = job.max_attempts,
            "Processing job"
        );

        let heartbeat = self.spawn_heartbeat(job.id);
        let result = self.invoke(&job).await;
        heartbeat.abort();

        self.settle(job, result).await
    }

    /// Run the processor in its own task so a panic becomes a failed attempt.
    async fn invoke(&self, job: &Job) -> Result<(), ProcessingError> {
        let processor = Arc::clone(&self.processor);
        let owned = job.clone();
        match tokio::spawn(async move { processor.process(&owned).await }).await {
            Ok(result) => result,
            Err(join_err) if join_err.is_panic() => Err(ProcessingError::Retryable(format!(
                "processing panicked: {}",
                panic_message(join_err.into_panic())
            ))),
            Err(join_err) => Err(ProcessingError::Retryable(format!(
                "processing task aborted: {join_err}"
            ))),
        }
    }

    /// Keep extending the lease while the job runs.
    fn spawn_heartbeat(&self, job_id: JobId) -> JoinHandle<()> {
        let store = self.store.clone();
        let worker_id = self.worker_id.clone();
        let lease = self.visibility_timeout();

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(lease / 3);
            ticker.tick().await;
            loop {
                ticker.tick().await;
                match store.extend_visibility(job_id, &worker_id, lease).await {
                    Ok(true) => tracing::trace!(job_id = %job_id, "Lease extended"),
                    Ok(false) => {
                        tracing::warn!(job_id = %job_id, worker_id = %worker_id, "Lease no longer held");
                        break;
                    }
                    Err(e) => {
                        tracing::warn!(job_id = %job_id, error = %e, "Failed to extend lease");
                    }
                }
            }
        })
    }

    /// Record the attempt result in the store and publish the matching event.
    ///
    /// Every settle call names this pool's worker id, so a worker whose lease
    /// was reclaimed gets `Conflict` instead of overwriting the new holder.
    async fn settle(
        &self,
        job: Job,
        result: Result<(), ProcessingError>,
    ) -> AppResult<ProcessedJob> {
        let err = match result {
            Ok(()) => {
                let done = self.store.complete(job.id, &self.worker_id).await?;
                self.notifier.publish(JobEvent::Completed {
                    job_id: done.id,
                    queue: done.queue.clone(),
                    attempts: done.attempts,
                    latency_ms: done.latency_ms().unwrap_or(0),
                });
                return Ok(ProcessedJob {
                    job: done,
                    outcome: JobOutcome::Completed,
                });
            }
            Err(err) => err,
        };

        let error = err.message();
        let settled = if err.is_retryable() && job.has_attempts_left() {
            let delay = self.retry.delay_for(job.attempts);
            let retried = self
                .store
                .retry(job.id, &self.worker_id, &error, delay)
                .await?;
            if retried.state == JobState::Pending {
                tracing::warn!(
                    job_id = %job.id,
                    attempt = job.attempts,
                    max_attempts = job.max_attempts,
                    retry_in_ms = delay.as_millis() as u64,
                    error = %error,
                    "Job attempt failed, scheduling retry"
                );
                self.notifier.publish(JobEvent::Retrying {
                    job_id: job.id,
                    queue: job.queue.clone(),
                    attempts: job.attempts,
                    error: error.clone(),
                    retry_in_ms: delay.as_millis() as u64,
                });
                return Ok(ProcessedJob {
                    job: retried,
                    outcome: JobOutcome::Retrying { delay, error },
                });
            }
            // Cancelled while running: the store failed it instead.
            retried
        } else {
            self.store.fail(job.id, &self.worker_id, &error).await?
        };

        let error = settled.error.clone().unwrap_or(error);
        tracing::warn!(
            job_id = %settled.id,
            attempts = settled.attempts,
            error = %error,
            "Job failed"
        );
        self.notifier.publish(JobEvent::Failed {
            job_id: settled.id,
            queue: settled.queue.clone(),
            attempts: settled.attempts,
            error: error.clone(),
        });
        Ok(ProcessedJob {
            job: settled,
            outcome: JobOutcome::Failed { error },
        })
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;
    use chrono::Utc;
    use fileflow_broker::memory::MemoryJobStore;
    use fileflow_core::events::EventEnvelope;
    use fileflow_notify::{JobObserver, ObserverRegistry};
    use tokio::sync::mpsc;

    use super::*;

    #[derive(Debug)]
    enum Behavior {
        Succeed,
        AlwaysRetryable,
        Fatal,
        Panic,
        Sleep(Duration),
    }

    #[derive(Debug)]
    struct Scripted {
        behavior: Behavior,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self {
                behavior,
                calls: AtomicU32::new(0),
            })
        }
    }

    #[async_trait]
    impl JobProcessor for Scripted {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn process(&self, _job: &Job) -> Result<(), ProcessingError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match &self.behavior {
                Behavior::Succeed => Ok(()),
                Behavior::AlwaysRetryable => Err(ProcessingError::Retryable("disk busy".into())),
                Behavior::Fatal => Err(ProcessingError::Fatal("corrupt image".into())),
                Behavior::Panic => panic!("decoder exploded"),
                Behavior::Sleep(d) => {
                    tokio::time::sleep(*d).await;
                    Ok(())
                }
            }
        }
    }

    #[derive(Debug)]
    struct Forward(mpsc::UnboundedSender<JobEvent>);

    #[async_trait]
    impl JobObserver for Forward {
        fn name(&self) -> &str {
            "forward"
        }

        async fn handle(&self, envelope: &EventEnvelope) -> AppResult<()> {
            let _ = self.0.send(envelope.event.clone());
            Ok(())
        }
    }

    struct Harness {
        store: BrokerManager,
        pool: WorkerPool,
        events: mpsc::UnboundedReceiver<JobEvent>,
    }

    async fn harness(processor: Arc<dyn JobProcessor>, config: WorkerConfig) -> Harness {
        let store = BrokerManager::from_store(Arc::new(MemoryJobStore::new()));
        let registry = Arc::new(ObserverRegistry::new());
        let (tx, events) = mpsc::unbounded_channel();
        registry.register(Arc::new(Forward(tx))).await;
        let (notifier, _task) = EventNotifier::start(registry, Duration::from_secs(1));
        let pool = WorkerPool::new(store.clone(), processor, notifier, config, "uploads")
            .with_worker_id("w1");
        Harness { store, pool, events }
    }

    fn fast_retries() -> WorkerConfig {
        WorkerConfig {
            retry_base_delay_ms: 0,
            retry_max_delay_ms: 0,
            ..WorkerConfig::default()
        }
    }

    async fn next_event(events: &mut mpsc::UnboundedReceiver<JobEvent>) -> JobEvent {
        tokio::time::timeout(Duration::from_secs(5), events.recv())
            .await
            .expect("event in time")
            .expect("channel open")
    }

    fn payload() -> serde_json::Value {
        serde_json::json!({"original_filename": "a.png", "size_bytes": 100})
    }

    #[tokio::test]
    async fn test_success_completes_after_one_attempt() {
        let mut h = harness(Scripted::new(Behavior::Succeed), fast_retries()).await;
        let job = h.store.enqueue("uploads", payload(), 3).await.unwrap();

        let processed = h.pool.process_next().await.unwrap().unwrap();
        assert_eq!(processed.outcome, JobOutcome::Completed);
        assert_eq!(processed.job.attempts, 1);

        let stored = h.store.get(job.id).await.unwrap();
        assert_eq!(stored.state, JobState::Completed);
        assert!(stored.error.is_none());
        assert!(matches!(
            next_event(&mut h.events).await,
            JobEvent::Completed { attempts: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_always_failing_job_exhausts_budget() {
        let processor = Scripted::new(Behavior::AlwaysRetryable);
        let mut h = harness(processor.clone(), fast_retries()).await;
        let job = h.store.enqueue("uploads", payload(), 3).await.unwrap();

        for _ in 0..2 {
            let processed = h.pool.process_next().await.unwrap().unwrap();
            assert!(matches!(processed.outcome, JobOutcome::Retrying { .. }));
            assert!(matches!(
                next_event(&mut h.events).await,
                JobEvent::Retrying { .. }
            ));
        }
        let last = h.pool.process_next().await.unwrap().unwrap();
        assert_eq!(
            last.outcome,
            JobOutcome::Failed {
                error: "disk busy".to_string()
            }
        );
        assert!(h.pool.process_next().await.unwrap().is_none());

        let stored = h.store.get(job.id).await.unwrap();
        assert_eq!(stored.state, JobState::Failed);
        assert_eq!(stored.attempts, 3);
        assert_eq!(stored.error.as_deref(), Some("disk busy"));
        assert_eq!(processor.calls.load(Ordering::SeqCst), 3);
        assert!(matches!(
            next_event(&mut h.events).await,
            JobEvent::Failed { attempts: 3, .. }
        ));
    }

    #[tokio::test]
    async fn test_fatal_error_fails_immediately() {
        let h = harness(Scripted::new(Behavior::Fatal), fast_retries()).await;
        let job = h.store.enqueue("uploads", payload(), 3).await.unwrap();

        let processed = h.pool.process_next().await.unwrap().unwrap();
        assert!(matches!(processed.outcome, JobOutcome::Failed { .. }));
        assert_eq!(h.store.get(job.id).await.unwrap().attempts, 1);
    }

    #[tokio::test]
    async fn test_panic_counts_as_failed_attempt() {
        let h = harness(Scripted::new(Behavior::Panic), fast_retries()).await;
        let job = h.store.enqueue("uploads", payload(), 3).await.unwrap();

        let processed = h.pool.process_next().await.unwrap().unwrap();
        assert!(matches!(processed.outcome, JobOutcome::Retrying { .. }));
        let stored = h.store.get(job.id).await.unwrap();
        assert_eq!(stored.state, JobState::Pending);
        assert!(
            stored
                .last_error
                .as_deref()
                .is_some_and(|e| e.contains("decoder exploded"))
        );
    }

    #[tokio::test]
    async fn test_retry_uses_backoff_delay() {
        let config = WorkerConfig {
            retry_base_delay_ms: 60_000,
            retry_max_delay_ms: 60_000,
            ..WorkerConfig::default()
        };
        let h = harness(Scripted::new(Behavior::AlwaysRetryable), config).await;
        h.store.enqueue("uploads", payload(), 3).await.unwrap();

        let processed = h.pool.process_next().await.unwrap().unwrap();
        assert!(matches!(
            processed.outcome,
            JobOutcome::Retrying { delay, .. } if delay == Duration::from_secs(60)
        ));
        assert!(h.pool.process_next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_requested_while_active_prevents_retry() {
        let h = harness(Scripted::new(Behavior::AlwaysRetryable), fast_retries()).await;
        let job = h.store.enqueue("uploads", payload(), 3).await.unwrap();
        let claimed = h
            .store
            .dequeue("uploads", "w1", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();
        h.store.cancel(job.id, "user request").await.unwrap();

        let result = h.pool.invoke(&claimed).await;
        let processed = h.pool.settle(claimed, result).await.unwrap();
        assert_eq!(
            processed.outcome,
            JobOutcome::Failed {
                error: "user request".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_cancel_racing_retry_publishes_failed() {
        let processor = Scripted::new(Behavior::AlwaysRetryable);
        let mut h = harness(processor.clone(), fast_retries()).await;
        let job = h.store.enqueue("uploads", payload(), 3).await.unwrap();
        let claimed = h
            .store
            .dequeue("uploads", "w1", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();

        // The attempt has already failed when the cancellation lands.
        let result = h.pool.invoke(&claimed).await;
        h.store.cancel(job.id, "user request").await.unwrap();
        let processed = h.pool.settle(claimed, result).await.unwrap();

        assert_eq!(processed.job.state, JobState::Failed);
        assert_eq!(processed.job.last_error.as_deref(), Some("disk busy"));
        match next_event(&mut h.events).await {
            JobEvent::Failed { job_id, error, .. } => {
                assert_eq!(job_id, job.id);
                assert_eq!(error, "user request");
            }
            other => panic!("expected a failed event, got {other:?}"),
        }

        assert!(h.pool.process_next().await.unwrap().is_none());
        assert_eq!(processor.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_worker_cannot_settle_reclaimed_job() {
        let mut h = harness(Scripted::new(Behavior::Succeed), fast_retries()).await;
        let job = h.store.enqueue("uploads", payload(), 3).await.unwrap();
        let claimed = h
            .store
            .dequeue("uploads", "w1", Duration::from_secs(1))
            .await
            .unwrap()
            .unwrap();

        let later = Utc::now() + chrono::TimeDelta::seconds(5);
        h.store.reclaim_stale("uploads", later).await.unwrap();
        h.store
            .dequeue("uploads", "w2", Duration::from_secs(30))
            .await
            .unwrap()
            .unwrap();

        let result = h.pool.invoke(&claimed).await;
        let err = h.pool.settle(claimed, result).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Conflict);

        let held = h.store.get(job.id).await.unwrap();
        assert_eq!(held.state, JobState::Active);
        assert_eq!(held.worker_id.as_deref(), Some("w2"));
        assert!(
            tokio::time::timeout(Duration::from_millis(200), h.events.recv())
                .await
                .is_err(),
            "no event for a settle that lost its lease"
        );
    }

    #[tokio::test]
    async fn test_heartbeat_keeps_long_job_leased() {
        let config = WorkerConfig {
            visibility_timeout_seconds: 1,
            ..fast_retries()
        };
        let h = harness(
            Scripted::new(Behavior::Sleep(Duration::from_millis(1_600))),
            config,
        )
        .await;
        h.store.enqueue("uploads", payload(), 3).await.unwrap();

        let store = h.store.clone();
        let sweep = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(1_300)).await;
            store.reclaim_stale("uploads", Utc::now()).await.unwrap()
        });

        let processed = h.pool.process_next().await.unwrap().unwrap();
        assert_eq!(processed.outcome, JobOutcome::Completed);
        assert!(sweep.await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_run_drains_queue_and_stops_on_shutdown() {
        let config = WorkerConfig {
            concurrency: 3,
            poll_interval_ms: 10,
            max_poll_interval_ms: 50,
            ..fast_retries()
        };
        let h = harness(Scripted::new(Behavior::Succeed), config).await;
        for _ in 0..10 {
            h.store.enqueue("uploads", payload(), 3).await.unwrap();
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let pool = Arc::new(h.pool);
        let runner = tokio::spawn(Arc::clone(&pool).run(shutdown_rx));

        let store = h.store.clone();
        tokio::time::timeout(Duration::from_secs(10), async move {
            loop {
                if store.stats("uploads").await.unwrap().completed == 10 {
                    break;
                }
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
        })
        .await
        .expect("all jobs completed");

        shutdown_tx.send(true).unwrap();
        tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("pool stopped")
            .unwrap();
    }
}
