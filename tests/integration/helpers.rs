//! Shared test helpers for integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::Value;
use tokio::sync::mpsc;
use tower::ServiceExt;

use fileflow_broker::BrokerManager;
use fileflow_broker::memory::MemoryJobStore;
use fileflow_core::config::{AppConfig, WorkerConfig};
use fileflow_core::events::{EventEnvelope, JobEvent};
use fileflow_core::result::AppResult;
use fileflow_notify::observers::MetricsObserver;
use fileflow_notify::{EventNotifier, JobObserver, ObserverRegistry};
use fileflow_worker::UploadProducer;

/// Queue used by every test.
pub const QUEUE: &str = "uploads";

/// Forwards every delivered event into a channel.
#[derive(Debug)]
pub struct ChannelObserver(pub mpsc::UnboundedSender<JobEvent>);

#[async_trait]
impl JobObserver for ChannelObserver {
    fn name(&self) -> &str {
        "channel"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> AppResult<()> {
        let _ = self.0.send(envelope.event.clone());
        Ok(())
    }
}

/// Everything a worker-side test needs, backed by the in-memory store.
pub struct TestQueue {
    /// Shared job store
    pub store: BrokerManager,
    /// Producer writing to [`QUEUE`]
    pub producer: UploadProducer,
    /// Notifier feeding [`TestQueue::events`] and [`TestQueue::metrics`]
    pub notifier: EventNotifier,
    /// Delivered events
    pub events: mpsc::UnboundedReceiver<JobEvent>,
    /// Aggregated outcome counters
    pub metrics: Arc<MetricsObserver>,
}

impl TestQueue {
    /// Create a fresh in-memory queue.
    pub async fn new() -> Self {
        Self::with_store(BrokerManager::from_store(Arc::new(MemoryJobStore::new()))).await
    }

    /// Wire a producer and notifier around an existing store.
    pub async fn with_store(store: BrokerManager) -> Self {
        let registry = Arc::new(ObserverRegistry::new());
        let (tx, events) = mpsc::unbounded_channel();
        let metrics = Arc::new(MetricsObserver::new());
        registry.register(Arc::new(ChannelObserver(tx))).await;
        registry.register(metrics.clone()).await;
        let (notifier, _dispatcher) = EventNotifier::start(registry, Duration::from_secs(1));

        let config = AppConfig::default();
        let producer = UploadProducer::new(
            store.clone(),
            QUEUE,
            config.worker.max_attempts,
            config.upload.clone(),
        );

        Self {
            store,
            producer,
            notifier,
            events,
            metrics,
        }
    }

    /// Wait for the next delivered event.
    pub async fn next_event(&mut self) -> JobEvent {
        tokio::time::timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("event delivered in time")
            .expect("event channel open")
    }
}

/// Worker settings with immediate retries and a one second lease.
pub fn fast_worker_config() -> WorkerConfig {
    WorkerConfig {
        concurrency: 2,
        poll_interval_ms: 10,
        max_poll_interval_ms: 50,
        retry_base_delay_ms: 0,
        retry_max_delay_ms: 0,
        visibility_timeout_seconds: 1,
        shutdown_timeout_seconds: 5,
        ..WorkerConfig::default()
    }
}

/// HTTP-level test application over an in-memory queue.
pub struct TestApp {
    /// The Axum router for making test requests
    pub router: Router,
    /// Queue behind the router
    pub queue: TestQueue,
}

impl TestApp {
    /// Create a new test application
    pub async fn new() -> Self {
        let queue = TestQueue::new().await;
        let config = Arc::new(AppConfig::default());
        let state = fileflow_api::AppState::new(
            config,
            queue.producer.clone(),
            Arc::clone(&queue.metrics),
        );
        let router = fileflow_api::build_router(state);
        Self { router, queue }
    }

    /// Make an HTTP request to the test app
    pub async fn request(&self, method: &str, path: &str, body: Option<Value>) -> TestResponse {
        let body_str = body
            .map(|b| serde_json::to_string(&b).expect("Failed to serialize body"))
            .unwrap_or_default();

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json")
            .body(Body::from(body_str))
            .expect("Failed to build request");

        let response = self
            .router
            .clone()
            .oneshot(req)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), 1024 * 1024)
            .await
            .expect("Failed to read body");

        let body: Value = serde_json::from_slice(&body_bytes).unwrap_or(Value::Null);

        TestResponse { status, body }
    }
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    /// HTTP status code
    pub status: StatusCode,
    /// Parsed JSON body
    pub body: Value,
}
