//! File metadata persistence used by the upload processor.
//!
//! Records are keyed by job id, so a job processed twice overwrites its own
//! record instead of creating a second one.

pub mod json;
pub mod memory;

use async_trait::async_trait;

use fileflow_core::result::AppResult;
use fileflow_core::types::id::{JobId, UserId};
use fileflow_entity::file::FileRecord;

pub use json::JsonFileMetadataStore;
pub use memory::MemoryMetadataStore;

/// Storage for processed-file metadata and user profile image pointers.
#[async_trait]
pub trait FileMetadataStore: Send + Sync + std::fmt::Debug + 'static {
    /// Insert or replace the record of a processed upload.
    async fn save_file(&self, record: &FileRecord) -> AppResult<()>;

    /// Fetch the record written by a job.
    async fn find_by_job(&self, job_id: JobId) -> AppResult<Option<FileRecord>>;

    /// Point a user's profile image at `path`.
    async fn set_profile_image(&self, owner_id: UserId, path: &str) -> AppResult<()>;

    /// Current profile image of a user.
    async fn profile_image(&self, owner_id: UserId) -> AppResult<Option<String>>;
}
