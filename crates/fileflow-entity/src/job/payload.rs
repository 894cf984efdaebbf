//! Typed upload payload carried by upload-processing jobs.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use fileflow_core::types::id::UserId;

/// Descriptor of an accepted upload, as handed over by the serving layer.
///
/// Only `original_filename` and `size_bytes` are required at enqueue time;
/// the processing function checks the fields it needs. Limits that depend
/// on configuration (size cap, MIME allow-list) are checked by the producer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct UploadDescriptor {
    /// Filename as supplied by the client.
    #[validate(
        length(min = 1, message = "original_filename is required"),
        custom(function = "plain_file_name")
    )]
    pub original_filename: String,
    /// Filename assigned by the serving layer on disk.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(custom(function = "plain_file_name"))]
    pub stored_filename: Option<String>,
    /// File size in bytes.
    #[validate(range(min = 1, message = "size_bytes must be positive"))]
    pub size_bytes: u64,
    /// MIME type reported by the client.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// Where the serving layer wrote the raw upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_path: Option<String>,
    /// User owning the upload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<UserId>,
}

impl UploadDescriptor {
    /// Minimal descriptor with just a filename and size.
    pub fn new(original_filename: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            original_filename: original_filename.into(),
            stored_filename: None,
            size_bytes,
            mime_type: None,
            storage_path: None,
            owner_id: None,
        }
    }

    /// Serialize into the opaque job payload.
    pub fn to_payload(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }

    /// Parse back from a job payload.
    pub fn from_payload(payload: &serde_json::Value) -> serde_json::Result<Self> {
        serde_json::from_value(payload.clone())
    }
}

/// A file name must name a single entry inside the upload directory.
fn plain_file_name(name: &str) -> Result<(), ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." {
        return Err(ValidationError::new("plain_file_name")
            .with_message("must be a non-empty file name".into()));
    }
    if name.contains('/') || name.contains('\\') {
        return Err(ValidationError::new("plain_file_name")
            .with_message("must not contain path separators".into()));
    }
    Ok(())
}
