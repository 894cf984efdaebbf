//! Upload acceptance and processing configuration.

use serde::{Deserialize, Serialize};

/// Limits applied when accepting an upload and paths used when processing it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Directory processed files are moved into.
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
    /// Directory holding file metadata records.
    #[serde(default = "default_records_dir")]
    pub records_dir: String,
    /// Maximum accepted file size in bytes.
    #[serde(default = "default_max_file_size")]
    pub max_file_size_bytes: u64,
    /// Accepted MIME types. An empty list accepts any type.
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            upload_dir: default_upload_dir(),
            records_dir: default_records_dir(),
            max_file_size_bytes: default_max_file_size(),
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

fn default_upload_dir() -> String {
    "data/uploads".to_string()
}

fn default_records_dir() -> String {
    "data/records".to_string()
}

fn default_max_file_size() -> u64 {
    5 * 1024 * 1024
}

fn default_allowed_mime_types() -> Vec<String> {
    vec![
        "image/jpeg".to_string(),
        "image/png".to_string(),
        "image/jpg".to_string(),
    ]
}
