//! Observer that relays job events over Redis pub/sub.
//!
//! Each event is published as JSON on `<prefix>events:<queue>`, letting
//! observers in other processes subscribe to outcomes.

use async_trait::async_trait;
use redis::aio::ConnectionManager;
use tracing::{debug, info};

use fileflow_core::error::AppError;
use fileflow_core::events::EventEnvelope;
use fileflow_core::result::AppResult;

use crate::observer::JobObserver;

/// Publishes event envelopes to Redis channels.
#[derive(Clone)]
pub struct RedisEventPublisher {
    conn: ConnectionManager,
    key_prefix: String,
}

impl std::fmt::Debug for RedisEventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisEventPublisher")
            .field("key_prefix", &self.key_prefix)
            .finish_non_exhaustive()
    }
}

impl RedisEventPublisher {
    /// Connect to Redis for publishing.
    pub async fn connect(url: &str, key_prefix: impl Into<String>) -> AppResult<Self> {
        let client = redis::Client::open(url)
            .map_err(|e| AppError::store_unavailable("Failed to create Redis client", e))?;
        let conn = ConnectionManager::new(client)
            .await
            .map_err(|e| AppError::store_unavailable("Redis connection failed", e))?;

        info!("Redis event publisher connected");
        Ok(Self {
            conn,
            key_prefix: key_prefix.into(),
        })
    }

    /// Channel events of `queue` are published on.
    pub fn channel(&self, queue: &str) -> String {
        channel_name(&self.key_prefix, queue)
    }
}

fn channel_name(prefix: &str, queue: &str) -> String {
    format!("{prefix}events:{queue}")
}

#[async_trait]
impl JobObserver for RedisEventPublisher {
    fn name(&self) -> &str {
        "redis-events"
    }

    async fn handle(&self, envelope: &EventEnvelope) -> AppResult<()> {
        let channel = self.channel(envelope.event.queue());
        let message = serde_json::to_string(envelope)?;

        let mut conn = self.conn.clone();
        let receivers: i64 = redis::cmd("PUBLISH")
            .arg(&channel)
            .arg(message)
            .query_async(&mut conn)
            .await
            .map_err(|e| AppError::store_unavailable(format!("Redis PUBLISH failed: {e}"), e))?;

        debug!(channel = %channel, receivers, "Published job event");
        Ok(())
    }
}
