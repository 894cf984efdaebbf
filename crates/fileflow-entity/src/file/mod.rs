//! Persisted file metadata.

pub mod record;

pub use record::FileRecord;
