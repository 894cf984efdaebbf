//! In-memory job store provider.

pub mod store;

pub use store::MemoryJobStore;
