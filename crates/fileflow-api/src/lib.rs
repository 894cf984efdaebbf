//! # fileflow-api
//!
//! HTTP API layer for FileFlow built on Axum.
//!
//! Accepts upload descriptors for background processing and exposes job
//! status, cancellation, queue statistics and health.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
