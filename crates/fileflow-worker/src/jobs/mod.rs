//! Built-in job processors.

pub mod upload;

pub use upload::UploadProcessor;
