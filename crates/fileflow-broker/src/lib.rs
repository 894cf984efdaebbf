//! # fileflow-broker
//!
//! Job store implementations for FileFlow. Supports two providers:
//!
//! - **memory**: In-process store guarded by a single mutex (tests and
//!   single-node development; not durable)
//! - **redis**: Durable store on Redis using the
//!   [redis](https://crates.io/crates/redis) crate, with every state
//!   transition executed as an atomic Lua script
//!
//! The provider is selected at runtime based on configuration.

#[cfg(feature = "redis-backend")]
pub mod keys;
#[cfg(feature = "memory")]
pub mod memory;
pub mod manager;
#[cfg(feature = "redis-backend")]
pub mod redis;
pub mod store;

pub use manager::BrokerManager;
pub use store::{CancelOutcome, JobStore, QueueStats, ReclaimOutcome, Reclaimed};
