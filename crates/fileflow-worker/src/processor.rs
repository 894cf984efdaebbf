//! Processing function seam between the worker pool and business logic.

use async_trait::async_trait;

use fileflow_core::error::AppError;
use fileflow_entity::job::Job;

/// Business logic run for each claimed job.
///
/// Implementations must tolerate being called more than once for the same
/// job: delivery is at-least-once.
#[async_trait]
pub trait JobProcessor: Send + Sync + std::fmt::Debug + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// Process one job.
    async fn process(&self, job: &Job) -> Result<(), ProcessingError>;
}

/// Error from a processing attempt
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    /// Transient failure; the attempt may be retried
    #[error("Retryable processing failure: {0}")]
    Retryable(String),

    /// Permanent failure; retrying cannot help
    #[error("Fatal processing failure: {0}")]
    Fatal(String),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(#[from] AppError),
}

impl ProcessingError {
    /// Whether another attempt may succeed. Only `Fatal` ends the job early.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal(_))
    }

    /// Description recorded on the job.
    pub fn message(&self) -> String {
        match self {
            Self::Retryable(msg) | Self::Fatal(msg) => msg.clone(),
            Self::Internal(e) => e.message.clone(),
        }
    }
}

impl From<std::io::Error> for ProcessingError {
    fn from(err: std::io::Error) -> Self {
        Self::Retryable(format!("I/O error: {err}"))
    }
}
