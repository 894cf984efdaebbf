//! # fileflow-entity
//!
//! Domain entities for FileFlow: the background [`job::Job`] with its
//! lifecycle state, the typed upload payload, and the file record written by
//! the upload processor.

pub mod file;
pub mod job;
