//! Application state shared across all handlers.

use std::sync::Arc;
use std::time::Instant;

use fileflow_core::config::AppConfig;
use fileflow_notify::observers::MetricsObserver;
use fileflow_worker::UploadProducer;

/// Application state containing all shared dependencies.
///
/// Passed to every Axum handler via `State<AppState>`.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Application configuration
    pub config: Arc<AppConfig>,
    /// Upload producer (also answers status and cancellation queries)
    pub producer: UploadProducer,
    /// Outcome counters fed by the event notifier
    pub metrics: Arc<MetricsObserver>,
    /// Process start, for uptime reporting
    pub started_at: Instant,
}

impl AppState {
    /// Build the state.
    pub fn new(
        config: Arc<AppConfig>,
        producer: UploadProducer,
        metrics: Arc<MetricsObserver>,
    ) -> Self {
        Self {
            config,
            producer,
            metrics,
            started_at: Instant::now(),
        }
    }
}
