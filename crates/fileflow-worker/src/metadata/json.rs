//! Metadata store writing one JSON document per record.
//!
//! Layout under the records directory:
//! - `files/<job_id>.json`: the [`FileRecord`] written by a job
//! - `profiles/<user_id>.json`: the user's profile image pointer
//!
//! Files are written to a temporary sibling and renamed into place, so a
//! reader never sees a partial document.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::debug;

use fileflow_core::result::AppResult;
use fileflow_core::types::id::{JobId, UserId};
use fileflow_entity::file::FileRecord;

use super::FileMetadataStore;

/// Profile document stored per user.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileDocument {
    owner_id: UserId,
    profile_image: String,
    updated_at: DateTime<Utc>,
}

/// File-system backed metadata store.
#[derive(Debug, Clone)]
pub struct JsonFileMetadataStore {
    root: PathBuf,
}

impl JsonFileMetadataStore {
    /// Use `root` as the records directory. Directories are created lazily.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn file_path(&self, job_id: JobId) -> PathBuf {
        self.root.join("files").join(format!("{job_id}.json"))
    }

    fn profile_path(&self, owner_id: UserId) -> PathBuf {
        self.root.join("profiles").join(format!("{owner_id}.json"))
    }
}

async fn write_json<T: Serialize>(path: &Path, value: &T) -> AppResult<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let bytes = serde_json::to_vec_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    debug!(path = %path.display(), "Wrote metadata document");
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> AppResult<Option<T>> {
    match tokio::fs::read(path).await {
        Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl FileMetadataStore for JsonFileMetadataStore {
    async fn save_file(&self, record: &FileRecord) -> AppResult<()> {
        write_json(&self.file_path(record.job_id), record).await
    }

    async fn find_by_job(&self, job_id: JobId) -> AppResult<Option<FileRecord>> {
        read_json(&self.file_path(job_id)).await
    }

    async fn set_profile_image(&self, owner_id: UserId, path: &str) -> AppResult<()> {
        let document = ProfileDocument {
            owner_id,
            profile_image: path.to_string(),
            updated_at: Utc::now(),
        };
        write_json(&self.profile_path(owner_id), &document).await
    }

    async fn profile_image(&self, owner_id: UserId) -> AppResult<Option<String>> {
        let document: Option<ProfileDocument> = read_json(&self.profile_path(owner_id)).await?;
        Ok(document.map(|d| d.profile_image))
    }
}

#[cfg(test)]
mod tests {
    use fileflow_core::types::id::FileId;

    use super::*;

    fn record(job_id: JobId, owner_id: Option<UserId>) -> FileRecord {
        FileRecord {
            id: FileId::new(),
            job_id,
            original_filename: "a.png".to_string(),
            stored_filename: "1700000000.png".to_string(),
            size_bytes: 100,
            mime_type: Some("image/png".to_string()),
            path: "/uploads/1700000000.png".to_string(),
            owner_id,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_save_and_find_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileMetadataStore::new(dir.path());
        let job_id = JobId::new();

        assert!(store.find_by_job(job_id).await.unwrap().is_none());
        let saved = record(job_id, None);
        store.save_file(&saved).await.unwrap();
        assert_eq!(store.find_by_job(job_id).await.unwrap(), Some(saved));
        assert!(dir.path().join("files").join(format!("{job_id}.json")).exists());
    }

    #[tokio::test]
    async fn test_saving_twice_keeps_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileMetadataStore::new(dir.path());
        let job_id = JobId::new();

        store.save_file(&record(job_id, None)).await.unwrap();
        let second = record(job_id, None);
        store.save_file(&second).await.unwrap();

        let entries = std::fs::read_dir(dir.path().join("files")).unwrap().count();
        assert_eq!(entries, 1);
        assert_eq!(store.find_by_job(job_id).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_profile_image_pointer() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileMetadataStore::new(dir.path());
        let owner = UserId::new();

        assert!(store.profile_image(owner).await.unwrap().is_none());
        store
            .set_profile_image(owner, "/uploads/1.png")
            .await
            .unwrap();
        store
            .set_profile_image(owner, "/uploads/2.png")
            .await
            .unwrap();
        assert_eq!(
            store.profile_image(owner).await.unwrap().as_deref(),
            Some("/uploads/2.png")
        );
    }
}
