//! # fileflow-core
//!
//! Core crate for FileFlow. Contains configuration schemas, typed
//! identifiers, job lifecycle events, and the unified error system.
//!
//! This crate has **no** internal dependencies on other FileFlow crates.

pub mod config;
pub mod error;
pub mod events;
pub mod result;
pub mod types;

pub use error::AppError;
pub use result::AppResult;
