//! Background upload processing for FileFlow.
//!
//! This crate provides:
//! - An upload producer that validates descriptors and enqueues jobs
//! - A worker pool that claims jobs and runs the injected processor
//! - A stale-job sweeper that reclaims jobs abandoned by crashed workers
//! - The upload processor and the file metadata stores it writes to

pub mod jobs;
pub mod metadata;
pub mod processor;
pub mod producer;
pub mod retry;
pub mod runner;
pub mod sweeper;

pub use processor::{JobProcessor, ProcessingError};
pub use producer::UploadProducer;
pub use runner::WorkerPool;
pub use sweeper::StaleJobSweeper;
