//! Observer that writes job outcomes to the log.

use async_trait::async_trait;
use tracing::{error, info, warn};

use fileflow_core::events::{EventEnvelope, JobEvent};
use fileflow_core::result::AppResult;

use crate::observer::JobObserver;

/// Logs every job outcome through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingObserver;

#[async_trait]
impl JobObserver for LoggingObserver {
    fn name(&self) -> &str {
        "logging"
    }

    async fn on_completed(&self, envelope: &EventEnvelope) -> AppResult<()> {
        if let JobEvent::Completed {
            job_id,
            queue,
            attempts,
            latency_ms,
        } = &envelope.event
        {
            info!(job_id = %job_id, queue = %queue, attempts, latency_ms, "Job completed");
        }
        Ok(())
    }

    async fn on_failed(&self, envelope: &EventEnvelope) -> AppResult<()> {
        if let JobEvent::Failed {
            job_id,
            queue,
            attempts,
            error,
        } = &envelope.event
        {
            error!(job_id = %job_id, queue = %queue, attempts, error = %error, "Job failed");
        }
        Ok(())
    }

    async fn on_retrying(&self, envelope: &EventEnvelope) -> AppResult<()> {
        if let JobEvent::Retrying {
            job_id,
            queue,
            attempts,
            error,
            retry_in_ms,
        } = &envelope.event
        {
            warn!(
                job_id = %job_id,
                queue = %queue,
                attempts,
                retry_in_ms,
                error = %error,
                "Job attempt failed, retrying"
            );
        }
        Ok(())
    }
}
