//! In-process job outcome counters.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use serde::Serialize;

use fileflow_core::events::{EventEnvelope, JobEvent};
use fileflow_core::result::AppResult;

use crate::observer::JobObserver;

/// Running latency totals for one queue.
#[derive(Debug, Default, Clone, Copy)]
struct LatencyTotals {
    count: u64,
    total_ms: u64,
    max_ms: u64,
}

/// Counts outcomes and tracks completion latency per queue.
#[derive(Debug, Default)]
pub struct MetricsObserver {
    completed: AtomicU64,
    failed: AtomicU64,
    retrying: AtomicU64,
    latency: DashMap<String, LatencyTotals>,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    /// Jobs completed since start.
    pub completed: u64,
    /// Jobs failed since start.
    pub failed: u64,
    /// Attempts that failed and were retried.
    pub retrying: u64,
    /// Completion latency by queue.
    pub queues: BTreeMap<String, QueueLatency>,
}

/// Completion latency summary for a queue.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueueLatency {
    /// Completed jobs measured.
    pub count: u64,
    /// Mean enqueue-to-completion time.
    pub avg_latency_ms: u64,
    /// Worst enqueue-to-completion time.
    pub max_latency_ms: u64,
}

impl MetricsObserver {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy the current counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        let queues = self
            .latency
            .iter()
            .map(|entry| {
                let totals = *entry.value();
                let avg = totals.total_ms.checked_div(totals.count).unwrap_or(0);
                (
                    entry.key().clone(),
                    QueueLatency {
                        count: totals.count,
                        avg_latency_ms: avg,
                        max_latency_ms: totals.max_ms,
                    },
                )
            })
            .collect();

        MetricsSnapshot {
            completed: self.completed.load(Ordering::Relaxed),
            failed: self.failed.load(Ordering::Relaxed),
            retrying: self.retrying.load(Ordering::Relaxed),
            queues,
        }
    }
}

#[async_trait]
impl JobObserver for MetricsObserver {
    fn name(&self) -> &str {
        "metrics"
    }

    async fn on_completed(&self, envelope: &EventEnvelope) -> AppResult<()> {
        self.completed.fetch_add(1, Ordering::Relaxed);
        if let JobEvent::Completed {
            queue, latency_ms, ..
        } = &envelope.event
        {
            let latency = u64::try_from(*latency_ms).unwrap_or(0);
            let mut totals = self.latency.entry(queue.clone()).or_default();
            totals.count += 1;
            totals.total_ms = totals.total_ms.saturating_add(latency);
            totals.max_ms = totals.max_ms.max(latency);
        }
        Ok(())
    }

    async fn on_failed(&self, _envelope: &EventEnvelope) -> AppResult<()> {
        self.failed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    async fn on_retrying(&self, _envelope: &EventEnvelope) -> AppResult<()> {
        self.retrying.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}
