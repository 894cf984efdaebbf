//! Upload processing job.
//!
//! Moves the raw upload written by the serving layer into the upload
//! directory, checks its size, then records its metadata and, for owned
//! uploads, points the owner's profile image at it.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use fileflow_core::types::id::FileId;
use fileflow_entity::file::FileRecord;
use fileflow_entity::job::{Job, UploadDescriptor};

use crate::metadata::FileMetadataStore;
use crate::processor::{JobProcessor, ProcessingError};

/// Public URL prefix of processed uploads.
const PUBLIC_PREFIX: &str = "/uploads";

/// Processor for upload jobs.
#[derive(Debug)]
pub struct UploadProcessor {
    /// Directory processed files are moved into.
    upload_dir: PathBuf,
    /// Metadata collaborator.
    metadata: Arc<dyn FileMetadataStore>,
}

impl UploadProcessor {
    /// Create a processor writing into `upload_dir`.
    pub fn new(upload_dir: impl Into<PathBuf>, metadata: Arc<dyn FileMetadataStore>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            metadata,
        }
    }

    /// Move the raw upload into place.
    ///
    /// A destination that already exists while the source is gone means an
    /// earlier attempt got this far, so the move is skipped.
    async fn move_into_place(&self, source: &Path, target: &Path) -> Result<(), ProcessingError> {
        let source_exists = tokio::fs::try_exists(source).await?;
        if !source_exists {
            if tokio::fs::try_exists(target).await? {
                tracing::debug!(target = %target.display(), "Upload already moved into place");
                return Ok(());
            }
            return Err(ProcessingError::Fatal(format!(
                "uploaded file {} not found",
                source.display()
            )));
        }

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        if tokio::fs::rename(source, target).await.is_err() {
            // Rename fails across file systems.
            tokio::fs::copy(source, target).await?;
            tokio::fs::remove_file(source).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl JobProcessor for UploadProcessor {
    fn name(&self) -> &str {
        "upload"
    }

    async fn process(&self, job: &Job) -> Result<(), ProcessingError> {
        let upload = UploadDescriptor::from_payload(&job.payload)
            .map_err(|e| ProcessingError::Fatal(format!("invalid upload descriptor: {e}")))?;

        let stored_filename = upload
            .stored_filename
            .as_deref()
            .ok_or_else(|| ProcessingError::Fatal("stored_filename is missing".to_string()))?;
        if Path::new(stored_filename).file_name() != Some(OsStr::new(stored_filename)) {
            return Err(ProcessingError::Fatal(format!(
                "stored_filename '{stored_filename}' is not a plain file name"
            )));
        }
        let storage_path = upload
            .storage_path
            .as_deref()
            .ok_or_else(|| ProcessingError::Fatal("storage_path is missing".to_string()))?;

        let target = self.upload_dir.join(stored_filename);
        self.move_into_place(Path::new(storage_path), &target).await?;

        let actual_size = tokio::fs::metadata(&target).await?.len();
        if actual_size != upload.size_bytes {
            return Err(ProcessingError::Fatal(format!(
                "size mismatch: descriptor says {} bytes, file has {actual_size}",
                upload.size_bytes
            )));
        }

        let public_path = format!("{PUBLIC_PREFIX}/{stored_filename}");
        let existing = self.metadata.find_by_job(job.id).await?;
        let record = FileRecord {
            id: existing.map(|r| r.id).unwrap_or_else(FileId::new),
            job_id: job.id,
            original_filename: upload.original_filename.clone(),
            stored_filename: stored_filename.to_string(),
            size_bytes: actual_size,
            mime_type: upload.mime_type.clone(),
            path: public_path.clone(),
            owner_id: upload.owner_id,
            created_at: Utc::now(),
        };
        self.metadata.save_file(&record).await?;

        if let Some(owner_id) = upload.owner_id {
            self.metadata
                .set_profile_image(owner_id, &public_path)
                .await?;
        }

        tracing::info!(
            job_id = %job.id,
            stored_filename,
            size_bytes = actual_size,
            "Upload processed"
        );
        Ok(())
    }
}
