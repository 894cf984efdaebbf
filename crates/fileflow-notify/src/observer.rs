//! Observer trait for job outcome events.

use async_trait::async_trait;

use fileflow_core::events::{EventEnvelope, JobEvent};
use fileflow_core::result::AppResult;

/// Receives job outcome events.
///
/// Every callback has a no-op default, so observers only implement the
/// outcomes they care about. Errors are logged by the notifier and never
/// reach the worker.
#[async_trait]
pub trait JobObserver: Send + Sync + std::fmt::Debug + 'static {
    /// Name used in logs.
    fn name(&self) -> &str;

    /// A job reached `completed`.
    async fn on_completed(&self, _envelope: &EventEnvelope) -> AppResult<()> {
        Ok(())
    }

    /// A job reached `failed`.
    async fn on_failed(&self, _envelope: &EventEnvelope) -> AppResult<()> {
        Ok(())
    }

    /// An attempt failed and the job will run again.
    async fn on_retrying(&self, _envelope: &EventEnvelope) -> AppResult<()> {
        Ok(())
    }

    /// Route an envelope to the matching callback.
    async fn handle(&self, envelope: &EventEnvelope) -> AppResult<()> {
        match envelope.event {
            JobEvent::Completed { .. } => self.on_completed(envelope).await,
            JobEvent::Failed { .. } => self.on_failed(envelope).await,
            JobEvent::Retrying { .. } => self.on_retrying(envelope).await,
        }
    }
}
