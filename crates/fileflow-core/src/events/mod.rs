//! Job lifecycle events emitted by the worker pool.
//!
//! Events are published through the event notifier and consumed by
//! observers (logging, metrics, webhooks, Redis pub/sub).

pub mod job;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use job::JobEvent;

/// Wrapper for job events with delivery metadata.
///
/// `id` identifies this emission; observers that must be idempotent should
/// dedupe on the job id carried in the payload instead, since a job may be
/// delivered to workers more than once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Unique event ID.
    pub id: Uuid,
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// The event payload.
    pub event: JobEvent,
}

impl EventEnvelope {
    /// Wrap an event with a fresh id and the current time.
    pub fn new(event: JobEvent) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            event,
        }
    }
}
