//! End-to-end tests of the upload pipeline: producer, store, worker pool,
//! sweeper and event delivery working together.

mod helpers;

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, watch};

use fileflow_broker::{BrokerManager, CancelOutcome, JobStore, QueueStats, Reclaimed};
use fileflow_core::error::{AppError, ErrorKind};
use fileflow_core::events::JobEvent;
use fileflow_core::result::AppResult;
use fileflow_core::types::id::{JobId, UserId};
use fileflow_entity::job::{Job, JobState, UploadDescriptor};
use fileflow_worker::jobs::UploadProcessor;
use fileflow_worker::metadata::{FileMetadataStore, MemoryMetadataStore};
use fileflow_worker::runner::JobOutcome;
use fileflow_worker::{JobProcessor, ProcessingError, StaleJobSweeper, WorkerPool};

use helpers::{QUEUE, TestQueue, fast_worker_config};

/// Succeeds and remembers every job it saw.
#[derive(Debug, Default)]
struct Recording {
    seen: Mutex<Vec<JobId>>,
}

#[async_trait]
impl JobProcessor for Recording {
    fn name(&self) -> &str {
        "recording"
    }

    async fn process(&self, job: &Job) -> Result<(), ProcessingError> {
        self.seen.lock().await.push(job.id);
        Ok(())
    }
}

/// Fails every attempt with a retryable error.
#[derive(Debug, Default)]
struct AlwaysFailing {
    calls: AtomicU32,
}

#[async_trait]
impl JobProcessor for AlwaysFailing {
    fn name(&self) -> &str {
        "always-failing"
    }

    async fn process(&self, _job: &Job) -> Result<(), ProcessingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(ProcessingError::Retryable("thumbnail service timed out".into()))
    }
}

/// Store whose backend is permanently unreachable.
#[derive(Debug)]
struct UnreachableStore;

fn unreachable() -> AppError {
    AppError::store_unavailable(
        "Job store unreachable",
        std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "connection refused"),
    )
}

#[async_trait]
impl JobStore for UnreachableStore {
    async fn enqueue(&self, _: &str, _: serde_json::Value, _: u32) -> AppResult<Job> {
        Err(unreachable())
    }

    async fn dequeue(&self, _: &str, _: &str, _: Duration) -> AppResult<Option<Job>> {
        Err(unreachable())
    }

    async fn complete(&self, _: JobId, _: &str) -> AppResult<Job> {
        Err(unreachable())
    }

    async fn fail(&self, _: JobId, _: &str, _: &str) -> AppResult<Job> {
        Err(unreachable())
    }

    async fn retry(&self, _: JobId, _: &str, _: &str, _: Duration) -> AppResult<Job> {
        Err(unreachable())
    }

    async fn extend_visibility(&self, _: JobId, _: &str, _: Duration) -> AppResult<bool> {
        Err(unreachable())
    }

    async fn reclaim_stale(&self, _: &str, _: DateTime<Utc>) -> AppResult<Vec<Reclaimed>> {
        Err(unreachable())
    }

    async fn cancel(&self, _: JobId, _: &str) -> AppResult<CancelOutcome> {
        Err(unreachable())
    }

    async fn get(&self, _: JobId) -> AppResult<Job> {
        Err(unreachable())
    }

    async fn stats(&self, _: &str) -> AppResult<QueueStats> {
        Err(unreachable())
    }

    async fn purge_finished(&self, _: &str, _: DateTime<Utc>) -> AppResult<u64> {
        Err(unreachable())
    }

    async fn health_check(&self) -> AppResult<bool> {
        Err(unreachable())
    }
}

#[tokio::test]
async fn test_upload_is_moved_and_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let staging = dir.path().join("staging");
    let uploads = dir.path().join("uploads");
    tokio::fs::create_dir_all(&staging).await.unwrap();
    let raw = staging.join("1700000000.png");
    tokio::fs::write(&raw, vec![7u8; 100]).await.unwrap();

    let mut q = TestQueue::new().await;
    let metadata = Arc::new(MemoryMetadataStore::new());
    let processor = Arc::new(UploadProcessor::new(&uploads, metadata.clone()));
    let pool = WorkerPool::new(
        q.store.clone(),
        processor,
        q.notifier.clone(),
        fast_worker_config(),
        QUEUE,
    );

    let owner = UserId::new();
    let descriptor = UploadDescriptor {
        original_filename: "a.png".to_string(),
        stored_filename: Some("1700000000.png".to_string()),
        size_bytes: 100,
        mime_type: Some("image/png".to_string()),
        storage_path: Some(raw.to_string_lossy().into_owned()),
        owner_id: Some(owner),
    };
    let job = q.producer.submit(&descriptor).await.unwrap();
    assert_eq!(job.state, JobState::Pending);

    let processed = pool.process_next().await.unwrap().expect("a job was due");
    assert_eq!(processed.outcome, JobOutcome::Completed);

    let stored = q.producer.status(job.id).await.unwrap();
    assert_eq!(stored.state, JobState::Completed);
    assert_eq!(stored.attempts, 1);
    assert!(stored.error.is_none());

    assert!(!raw.exists());
    assert!(uploads.join("1700000000.png").exists());

    let record = metadata.find_by_job(job.id).await.unwrap().expect("record");
    assert_eq!(record.size_bytes, 100);
    assert_eq!(record.original_filename, "a.png");
    assert_eq!(
        metadata.profile_image(owner).await.unwrap().as_deref(),
        Some("/uploads/1700000000.png")
    );

    assert!(matches!(q.next_event().await, JobEvent::Completed { job_id, .. } if job_id == job.id));
}

#[tokio::test]
async fn test_always_failing_job_ends_failed_after_three_attempts() {
    let mut q = TestQueue::new().await;
    let processor = Arc::new(AlwaysFailing::default());
    let pool = Arc::new(WorkerPool::new(
        q.store.clone(),
        processor.clone(),
        q.notifier.clone(),
        fast_worker_config(),
        QUEUE,
    ));

    let job = q
        .producer
        .submit(&UploadDescriptor::new("a.png", 100))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let worker = tokio::spawn(Arc::clone(&pool).run(shutdown_rx));

    let mut retries = 0;
    loop {
        match q.next_event().await {
            JobEvent::Retrying { .. } => retries += 1,
            JobEvent::Failed {
                job_id, attempts, ..
            } => {
                assert_eq!(job_id, job.id);
                assert_eq!(attempts, 3);
                break;
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    shutdown_tx.send(true).unwrap();
    worker.await.unwrap();

    assert_eq!(retries, 2);
    assert_eq!(processor.calls.load(Ordering::SeqCst), 3);

    let stored = q.producer.status(job.id).await.unwrap();
    assert_eq!(stored.state, JobState::Failed);
    assert_eq!(stored.attempts, 3);
    assert_eq!(stored.error.as_deref(), Some("thumbnail service timed out"));

    let snapshot = q.metrics.snapshot();
    assert_eq!(snapshot.failed, 1);
    assert_eq!(snapshot.retrying, 2);
}

#[tokio::test]
async fn test_job_of_crashed_worker_is_finished_by_another() {
    let mut q = TestQueue::new().await;
    let job = q
        .producer
        .submit(&UploadDescriptor::new("a.png", 100))
        .await
        .unwrap();

    // A worker claims the job and dies without settling it.
    let claimed = q
        .store
        .dequeue(QUEUE, "crashed-worker", Duration::from_millis(20))
        .await
        .unwrap()
        .expect("claimed");
    assert_eq!(claimed.id, job.id);
    tokio::time::sleep(Duration::from_millis(60)).await;

    let sweeper = StaleJobSweeper::new(q.store.clone(), q.notifier.clone(), QUEUE);
    let report = sweeper.sweep_once().await.unwrap();
    assert_eq!(report.requeued, 1);
    assert_eq!(report.failed, 0);

    let processor = Arc::new(Recording::default());
    let survivor = WorkerPool::new(
        q.store.clone(),
        processor.clone(),
        q.notifier.clone(),
        fast_worker_config(),
        QUEUE,
    )
    .with_worker_id("survivor");

    let processed = survivor.process_next().await.unwrap().expect("requeued job");
    assert_eq!(processed.outcome, JobOutcome::Completed);
    assert_eq!(processed.job.attempts, 2);
    assert_eq!(*processor.seen.lock().await, vec![job.id]);
    assert!(matches!(q.next_event().await, JobEvent::Completed { attempts: 2, .. }));
}

#[tokio::test]
async fn test_worker_returning_after_reclaim_cannot_settle() {
    let q = TestQueue::new().await;
    let job = q
        .producer
        .submit(&UploadDescriptor::new("a.png", 100))
        .await
        .unwrap();

    q.store
        .dequeue(QUEUE, "slow-worker", Duration::from_millis(20))
        .await
        .unwrap()
        .expect("claimed");
    tokio::time::sleep(Duration::from_millis(60)).await;
    StaleJobSweeper::new(q.store.clone(), q.notifier.clone(), QUEUE)
        .sweep_once()
        .await
        .unwrap();

    let processor = Arc::new(Recording::default());
    let survivor = WorkerPool::new(
        q.store.clone(),
        processor,
        q.notifier.clone(),
        fast_worker_config(),
        QUEUE,
    )
    .with_worker_id("survivor");
    let claimed = q
        .store
        .dequeue(QUEUE, survivor.worker_id(), Duration::from_secs(30))
        .await
        .unwrap()
        .expect("requeued job");
    assert_eq!(claimed.attempts, 2);

    // The slow worker finishes its stale attempt and tries to settle it.
    let err = q
        .store
        .retry(job.id, "slow-worker", "timed out", Duration::ZERO)
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);
    let err = q.store.complete(job.id, "slow-worker").await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::Conflict);

    let stored = q.store.get(job.id).await.unwrap();
    assert_eq!(stored.state, JobState::Active);
    assert_eq!(stored.worker_id.as_deref(), Some("survivor"));

    let done = q.store.complete(job.id, "survivor").await.unwrap();
    assert_eq!(done.state, JobState::Completed);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_two_pools_never_process_a_job_twice() {
    const JOBS: usize = 60;

    let mut q = TestQueue::new().await;
    let processor = Arc::new(Recording::default());
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let mut workers = Vec::new();
    for name in ["pool-a", "pool-b"] {
        let pool = Arc::new(
            WorkerPool::new(
                q.store.clone(),
                processor.clone(),
                q.notifier.clone(),
                fast_worker_config(),
                QUEUE,
            )
            .with_worker_id(name),
        );
        workers.push(tokio::spawn(pool.run(shutdown_rx.clone())));
    }

    let mut submitted = HashSet::new();
    for i in 0..JOBS {
        let job = q
            .producer
            .submit(&UploadDescriptor::new(format!("{i}.png"), 100))
            .await
            .unwrap();
        submitted.insert(job.id);
    }

    let mut completed = HashSet::new();
    while completed.len() < JOBS {
        match q.next_event().await {
            JobEvent::Completed { job_id, .. } => {
                assert!(completed.insert(job_id), "job {job_id} completed twice");
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
    shutdown_tx.send(true).unwrap();
    for worker in workers {
        worker.await.unwrap();
    }

    assert_eq!(completed, submitted);
    let seen = processor.seen.lock().await;
    assert_eq!(seen.len(), JOBS);

    let stats = q.producer.stats().await.unwrap();
    assert_eq!(stats.completed, JOBS as u64);
    assert_eq!(stats.pending, 0);
    assert_eq!(stats.active, 0);
}

#[tokio::test]
async fn test_cancelled_pending_job_is_never_processed() {
    let q = TestQueue::new().await;
    let processor = Arc::new(Recording::default());
    let pool = WorkerPool::new(
        q.store.clone(),
        processor.clone(),
        q.notifier.clone(),
        fast_worker_config(),
        QUEUE,
    );

    let job = q
        .producer
        .submit(&UploadDescriptor::new("a.png", 100))
        .await
        .unwrap();
    let outcome = q.producer.cancel(job.id, "user deleted upload").await.unwrap();
    assert!(matches!(outcome, CancelOutcome::Cancelled(_)));

    assert!(pool.process_next().await.unwrap().is_none());
    assert!(processor.seen.lock().await.is_empty());

    let stored = q.producer.status(job.id).await.unwrap();
    assert_eq!(stored.state, JobState::Failed);
    assert_eq!(stored.error.as_deref(), Some("user deleted upload"));
}

#[tokio::test]
async fn test_unreachable_store_surfaces_service_unavailable() {
    let q = TestQueue::with_store(BrokerManager::from_store(Arc::new(UnreachableStore))).await;

    let err = q
        .producer
        .submit(&UploadDescriptor::new("a.png", 100))
        .await
        .unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
    assert!(err.is_transient());

    let err = q.producer.status(JobId::new()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::ServiceUnavailable);
}

#[tokio::test]
async fn test_invalid_payload_is_rejected_before_enqueue() {
    let q = TestQueue::new().await;

    for payload in [
        serde_json::json!({}),
        serde_json::json!("a.png"),
        serde_json::json!({"original_filename": "", "size_bytes": 100}),
        serde_json::json!({"original_filename": "a.png", "size_bytes": 0}),
        serde_json::json!({"original_filename": "a.png"}),
    ] {
        let err = q.producer.submit_payload(&payload).await.unwrap_err();
        assert_eq!(err.kind, ErrorKind::Validation, "payload {payload}");
    }

    let stats = q.producer.stats().await.unwrap();
    assert_eq!(stats.pending, 0);
}

#[tokio::test]
async fn test_unknown_job_is_not_found() {
    let q = TestQueue::new().await;
    let err = q.producer.status(JobId::new()).await.unwrap_err();
    assert_eq!(err.kind, ErrorKind::NotFound);
}
