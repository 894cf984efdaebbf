//! Event notifier configuration.

use serde::{Deserialize, Serialize};

/// Job event fan-out configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifierConfig {
    /// Time budget for a single observer invocation in milliseconds.
    #[serde(default = "default_observer_timeout")]
    pub observer_timeout_ms: u64,
    /// Publish job events on Redis pub/sub (requires the redis broker).
    #[serde(default)]
    pub publish_redis_events: bool,
    /// URLs that receive every job event as a JSON POST.
    #[serde(default)]
    pub webhook_urls: Vec<String>,
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            observer_timeout_ms: default_observer_timeout(),
            publish_redis_events: false,
            webhook_urls: Vec::new(),
        }
    }
}

fn default_observer_timeout() -> u64 {
    5_000
}
