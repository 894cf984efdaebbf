//! In-memory metadata store.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use fileflow_core::result::AppResult;
use fileflow_core::types::id::{JobId, UserId};
use fileflow_entity::file::FileRecord;

use super::FileMetadataStore;

/// Metadata store held in process memory.
#[derive(Debug, Default)]
pub struct MemoryMetadataStore {
    files: RwLock<HashMap<JobId, FileRecord>>,
    profiles: RwLock<HashMap<UserId, String>>,
}

impl MemoryMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored file records.
    pub async fn file_count(&self) -> usize {
        self.files.read().await.len()
    }
}

#[async_trait]
impl FileMetadataStore for MemoryMetadataStore {
    async fn save_file(&self, record: &FileRecord) -> AppResult<()> {
        self.files
            .write()
            .await
            .insert(record.job_id, record.clone());
        Ok(())
    }

    async fn find_by_job(&self, job_id: JobId) -> AppResult<Option<FileRecord>> {
        Ok(self.files.read().await.get(&job_id).cloned())
    }

    async fn set_profile_image(&self, owner_id: UserId, path: &str) -> AppResult<()> {
        self.profiles
            .write()
            .await
            .insert(owner_id, path.to_string());
        Ok(())
    }

    async fn profile_image(&self, owner_id: UserId) -> AppResult<Option<String>> {
        Ok(self.profiles.read().await.get(&owner_id).cloned())
    }
}
