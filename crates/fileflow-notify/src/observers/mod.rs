//! Built-in job observers.

pub mod logging;
pub mod metrics;
#[cfg(feature = "redis-events")]
pub mod redis;
pub mod webhook;

pub use logging::LoggingObserver;
pub use metrics::{MetricsObserver, MetricsSnapshot, QueueLatency};
#[cfg(feature = "redis-events")]
pub use redis::RedisEventPublisher;
pub use webhook::WebhookObserver;
