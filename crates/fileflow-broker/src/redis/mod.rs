//! Redis job store provider.

pub mod client;
mod codec;
mod scripts;
pub mod store;

pub use client::RedisClient;
pub use store::RedisJobStore;
