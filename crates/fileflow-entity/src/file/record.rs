//! File record entity written after an upload has been processed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use fileflow_core::types::id::{FileId, JobId, UserId};

/// Metadata of a processed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    /// Record identifier.
    pub id: FileId,
    /// Job that produced this record.
    pub job_id: JobId,
    /// Filename as supplied by the client.
    pub original_filename: String,
    /// Filename on disk.
    pub stored_filename: String,
    /// File size in bytes.
    pub size_bytes: u64,
    /// MIME type, if known.
    pub mime_type: Option<String>,
    /// Public path of the stored file (e.g. `/uploads/1700000000.png`).
    pub path: String,
    /// Owner of the file.
    pub owner_id: Option<UserId>,
    /// When the record was written.
    pub created_at: DateTime<Utc>,
}
