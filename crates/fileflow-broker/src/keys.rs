//! Redis key builders for all job store entries.
//!
//! Keys are relative; [`RedisClient::prefixed_key`](crate::redis::RedisClient::prefixed_key)
//! applies the configured prefix.

use fileflow_core::types::id::JobId;

/// Relative prefix of every job hash.
pub const JOB_PREFIX: &str = "job:";

// ── Job keys ───────────────────────────────────────────────

/// Hash holding a single job record.
pub fn job(job_id: JobId) -> String {
    format!("{JOB_PREFIX}{job_id}")
}

// ── Queue keys ─────────────────────────────────────────────

/// List of pending job ids in claim order (LPUSH in, RPOP out).
pub fn pending(queue: &str) -> String {
    format!("queue:{queue}:pending")
}

/// Sorted set of retried job ids scored by the time they become due.
pub fn delayed(queue: &str) -> String {
    format!("queue:{queue}:delayed")
}

/// Sorted set of active job ids scored by lease deadline.
pub fn active(queue: &str) -> String {
    format!("queue:{queue}:active")
}

/// Sorted set of completed job ids scored by completion time.
pub fn completed(queue: &str) -> String {
    format!("queue:{queue}:completed")
}

/// Sorted set of failed job ids scored by failure time.
pub fn failed(queue: &str) -> String {
    format!("queue:{queue}:failed")
}
