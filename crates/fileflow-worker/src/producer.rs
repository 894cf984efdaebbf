//! Upload producer: validates upload descriptors and enqueues them.

use tracing::info;
use validator::Validate;

use fileflow_broker::{BrokerManager, CancelOutcome, JobStore, QueueStats};
use fileflow_core::config::UploadConfig;
use fileflow_core::error::AppError;
use fileflow_core::result::AppResult;
use fileflow_core::types::id::JobId;
use fileflow_entity::job::{Job, UploadDescriptor};

/// Accepts uploads on behalf of the serving layer.
///
/// Returns as soon as the job is stored; processing happens in the worker
/// pool.
#[derive(Debug, Clone)]
pub struct UploadProducer {
    store: BrokerManager,
    queue: String,
    max_attempts: u32,
    limits: UploadConfig,
}

impl UploadProducer {
    /// Create a producer enqueuing onto `queue`.
    pub fn new(
        store: BrokerManager,
        queue: impl Into<String>,
        max_attempts: u32,
        limits: UploadConfig,
    ) -> Self {
        Self {
            store,
            queue: queue.into(),
            max_attempts,
            limits,
        }
    }

    /// Queue name this producer writes to.
    pub fn queue(&self) -> &str {
        &self.queue
    }

    /// Check a descriptor's own fields, then the configured upload limits.
    pub fn validate(&self, upload: &UploadDescriptor) -> AppResult<()> {
        upload
            .validate()
            .map_err(|e| AppError::invalid_payload(e.to_string()))?;

        if upload.size_bytes > self.limits.max_file_size_bytes {
            return Err(AppError::invalid_payload(format!(
                "file of {} bytes exceeds the {} byte limit",
                upload.size_bytes, self.limits.max_file_size_bytes
            )));
        }
        if let Some(mime) = &upload.mime_type {
            let allowed = &self.limits.allowed_mime_types;
            if !allowed.is_empty() && !allowed.iter().any(|m| m.eq_ignore_ascii_case(mime)) {
                return Err(AppError::invalid_payload(format!(
                    "MIME type '{mime}' is not accepted"
                )));
            }
        }
        Ok(())
    }

    /// Validate and enqueue an upload.
    pub async fn submit(&self, upload: &UploadDescriptor) -> AppResult<Job> {
        self.validate(upload)?;
        let payload = upload.to_payload()?;
        let job = self
            .store
            .enqueue(&self.queue, payload, self.max_attempts)
            .await?;

        info!(
            job_id = %job.id,
            queue = %self.queue,
            filename = %upload.original_filename,
            size_bytes = upload.size_bytes,
            "Upload accepted for processing"
        );
        Ok(job)
    }

    /// Parse a raw JSON descriptor, then [`submit`](Self::submit) it.
    pub async fn submit_payload(&self, payload: &serde_json::Value) -> AppResult<Job> {
        if payload.as_object().is_none_or(|fields| fields.is_empty()) {
            return Err(AppError::invalid_payload("upload descriptor is empty"));
        }
        let upload = UploadDescriptor::from_payload(payload)
            .map_err(|e| AppError::invalid_payload(e.to_string()))?;
        self.submit(&upload).await
    }

    /// Current state of a job.
    pub async fn status(&self, job_id: JobId) -> AppResult<Job> {
        self.store.get(job_id).await
    }

    /// Cancel a job.
    pub async fn cancel(&self, job_id: JobId, reason: &str) -> AppResult<CancelOutcome> {
        let outcome = self.store.cancel(job_id, reason).await?;
        info!(job_id = %job_id, reason, "Job cancellation recorded");
        Ok(outcome)
    }

    /// Per-state counts of the producer's queue.
    pub async fn stats(&self) -> AppResult<QueueStats> {
        self.store.stats(&self.queue).await
    }

    /// Whether the job store is reachable.
    pub async fn health_check(&self) -> AppResult<bool> {
        self.store.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use fileflow_broker::memory::MemoryJobStore;
    use fileflow_core::error::ErrorKind;
    use fileflow_entity::job::JobState;

    use super::*;

    fn producer() -> UploadProducer {
        let store = BrokerManager::from_store(Arc::new(MemoryJobStore::new()));
        UploadProducer::new(store, "uploads", 3, UploadConfig::default())
    }

    #[tokio::test]
    async fn test_submit_minimal_descriptor() {
        let producer = producer();
        let job = producer
            .submit(&UploadDescriptor::new("a.png", 100))
            .await
            .unwrap();
        assert_eq!(job.state, JobState::Pending);
        assert_eq!(job.max_attempts, 3);
        assert_eq!(producer.status(job.id).await.unwrap().state, JobState::Pending);
        assert_eq!(producer.stats().await.unwrap().pending, 1);
    }

    #[test]
    fn test_rejections() {
        let producer = producer();
        let cases = [
            UploadDescriptor::new("   ", 100),
            UploadDescriptor::new("../etc/passwd", 100),
            UploadDescriptor::new("a\\b.png", 100),
            UploadDescriptor::new("a.png", 0),
            UploadDescriptor::new("a.png", 5 * 1024 * 1024 + 1),
            UploadDescriptor {
                mime_type: Some("application/x-msdownload".into()),
                ..UploadDescriptor::new("a.exe", 10)
            },
            UploadDescriptor {
                stored_filename: Some("x/y.png".into()),
                ..UploadDescriptor::new("a.png", 10)
            },
        ];
        for upload in cases {
            let err = producer.validate(&upload).unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation, "{upload:?}");
        }
    }

    #[test]
    fn test_rejection_names_the_field() {
        let err = producer()
            .validate(&UploadDescriptor::new("a/b.png", 10))
            .unwrap_err();
        assert!(err.message.contains("original_filename"), "{}", err.message);
        assert!(err.message.contains("path separators"), "{}", err.message);
    }

    #[test]
    fn test_mime_type_comparison_ignores_case() {
        let upload = UploadDescriptor {
            mime_type: Some("IMAGE/PNG".into()),
            ..UploadDescriptor::new("a.png", 10)
        };
        assert!(producer().validate(&upload).is_ok());
    }

    #[test]
    fn test_empty_allow_list_accepts_any_type() {
        let store = BrokerManager::from_store(Arc::new(MemoryJobStore::new()));
        let limits = UploadConfig {
            allowed_mime_types: Vec::new(),
            ..UploadConfig::default()
        };
        let producer = UploadProducer::new(store, "uploads", 3, limits);
        let upload = UploadDescriptor {
            mime_type: Some("text/plain".into()),
            ..UploadDescriptor::new("notes.txt", 10)
        };
        assert!(producer.validate(&upload).is_ok());
    }

    #[tokio::test]
    async fn test_submit_payload_rejects_malformed_json() {
        let producer = producer();
        for payload in [
            serde_json::json!({}),
            serde_json::json!(null),
            serde_json::json!({"original_filename": "a.png"}),
            serde_json::json!({"original_filename": "a.png", "size_bytes": "big"}),
        ] {
            let err = producer.submit_payload(&payload).await.unwrap_err();
            assert_eq!(err.kind, ErrorKind::Validation);
        }
        assert_eq!(producer.stats().await.unwrap().pending, 0);
    }
}
