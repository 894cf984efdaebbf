//! Background worker configuration.

use serde::{Deserialize, Serialize};

/// Background job worker configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Whether the worker is enabled.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Number of jobs processed concurrently by one pool.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    /// Initial wait in milliseconds after an empty poll.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,
    /// Upper bound in milliseconds for the empty-poll backoff.
    #[serde(default = "default_max_poll_interval")]
    pub max_poll_interval_ms: u64,
    /// Attempt budget given to every new job.
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
    /// Delay before the first retry in milliseconds; doubles per attempt.
    #[serde(default = "default_retry_base_delay")]
    pub retry_base_delay_ms: u64,
    /// Upper bound for the retry delay in milliseconds.
    #[serde(default = "default_retry_max_delay")]
    pub retry_max_delay_ms: u64,
    /// How long a claimed job may stay active without a heartbeat.
    #[serde(default = "default_visibility_timeout")]
    pub visibility_timeout_seconds: u64,
    /// Interval between stale-job sweeps.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_seconds: u64,
    /// Finished jobs older than this are purged by the sweeper. Unset keeps
    /// them forever.
    #[serde(default)]
    pub retention_hours: Option<u64>,
    /// Time allowed for in-flight jobs to finish on shutdown.
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_seconds: u64,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            concurrency: default_concurrency(),
            poll_interval_ms: default_poll_interval(),
            max_poll_interval_ms: default_max_poll_interval(),
            max_attempts: default_max_attempts(),
            retry_base_delay_ms: default_retry_base_delay(),
            retry_max_delay_ms: default_retry_max_delay(),
            visibility_timeout_seconds: default_visibility_timeout(),
            sweep_interval_seconds: default_sweep_interval(),
            retention_hours: None,
            shutdown_timeout_seconds: default_shutdown_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    4
}

fn default_poll_interval() -> u64 {
    250
}

fn default_max_poll_interval() -> u64 {
    5_000
}

fn default_max_attempts() -> u32 {
    3
}

fn default_retry_base_delay() -> u64 {
    1_000
}

fn default_retry_max_delay() -> u64 {
    60_000
}

fn default_visibility_timeout() -> u64 {
    30
}

fn default_sweep_interval() -> u64 {
    10
}

fn default_shutdown_timeout() -> u64 {
    30
}
