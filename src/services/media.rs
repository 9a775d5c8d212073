//! Upload, read and delete workflows for media.
//!
//! An upload stores the original, derives and stores a thumbnail, then
//! records both names in the catalog. Once the original is stored every
//! failure unwinds through [`Compensation`], which deletes the original, its
//! thumbnail key and any row the insert may have left behind before the
//! error is returned.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::services::catalog::{MediaCatalog, MediaRecord, NewMedia};
use crate::services::storage::StorageBackend;
use crate::utils::image_processor::{self, ThumbnailError, THUMBNAIL_MIME};
use crate::utils::mime::{validate_mime, IMAGE_MIMES};
use crate::utils::naming::generate_file_name;

/// Thumbnail storage keys are the original's key with this prefix.
pub const THUMB_PREFIX: &str = "thumb_";

pub fn thumb_name(filename: &str) -> String {
    format!("{THUMB_PREFIX}{filename}")
}

/// Workflow stage an upstream failure happened in.
///
/// Validation and naming are absent: they only ever fail with
/// [`MediaError::BadInput`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    StoringOriginal,
    Thumbnailing,
    StoringThumbnail,
    RecordingCatalog,
    Reading,
    Deleting,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::StoringOriginal => "storing file",
            Stage::Thumbnailing => "creating thumbnail",
            Stage::StoringThumbnail => "storing thumbnail",
            Stage::RecordingCatalog => "saving media record",
            Stage::Reading => "fetching media",
            Stage::Deleting => "deleting media",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0}")]
    BadInput(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Decode(String),
    #[error("error {stage}: {detail}")]
    Upstream { stage: Stage, detail: String },
}

impl MediaError {
    fn upstream(stage: Stage, detail: impl Into<String>) -> Self {
        MediaError::Upstream {
            stage,
            detail: detail.into(),
        }
    }
}

/// An uploaded file as received from the client.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: String,
    pub data: Bytes,
}

#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct UploadedMedia {
    pub id: i32,
    pub uuid: Uuid,
    pub filename: String,
    pub thumb_filename: String,
    pub url: String,
    pub thumb_url: String,
}

/// A catalog row with its storage-dependent fields resolved.
#[derive(Debug, Clone, Serialize, utoipa::ToSchema)]
pub struct Media {
    pub id: i32,
    pub uuid: Uuid,
    pub filename: String,
    pub thumb_filename: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
    pub url: String,
    pub thumb_url: String,
    #[serde(skip)]
    pub data: Option<Bytes>,
    pub supported_mime_types: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct MediaSettings {
    pub max_upload_bytes: usize,
    pub max_image_pixels: u64,
    /// Bound on every storage and catalog call.
    pub upstream_timeout: Duration,
}

impl Default for MediaSettings {
    fn default() -> Self {
        Self {
            max_upload_bytes: 20 * 1024 * 1024,
            max_image_pixels: 40_000_000,
            upstream_timeout: Duration::from_secs(30),
        }
    }
}

enum CompensatingAction {
    DeleteBlob(String),
    /// A timed-out insert may still commit, so the row is removed by uuid.
    DeleteRow(Uuid),
}

/// Undo log for a multi-step workflow, unwound newest first.
///
/// Unwinding never fails: errors are logged and the remaining actions still
/// run.
struct Compensation<'a> {
    storage: &'a dyn StorageBackend,
    catalog: &'a dyn MediaCatalog,
    timeout: Duration,
    actions: Vec<CompensatingAction>,
}

impl<'a> Compensation<'a> {
    fn new(storage: &'a dyn StorageBackend, catalog: &'a dyn MediaCatalog, timeout: Duration) -> Self {
        Self {
            storage,
            catalog,
            timeout,
            actions: Vec::new(),
        }
    }

    fn push(&mut self, action: CompensatingAction) {
        self.actions.push(action);
    }

    async fn unwind(self) {
        for action in self.actions.into_iter().rev() {
            match action {
                CompensatingAction::DeleteBlob(name) => {
                    match tokio::time::timeout(self.timeout, self.storage.delete(&name)).await {
                        Ok(Ok(())) => debug!(name = %name, "removed stored file"),
                        Ok(Err(e)) => warn!(name = %name, error = %e, "could not remove stored file"),
                        Err(_) => warn!(name = %name, "timed out removing stored file"),
                    }
                }
                CompensatingAction::DeleteRow(uuid) => {
                    match tokio::time::timeout(self.timeout, self.catalog.delete_media_by_uuid(uuid)).await {
                        Ok(Ok(true)) => warn!(uuid = %uuid, "removed media record left by a failed upload"),
                        Ok(Ok(false)) => debug!(uuid = %uuid, "no media record to remove"),
                        Ok(Err(e)) => warn!(uuid = %uuid, error = %e, "could not remove media record"),
                        Err(_) => warn!(uuid = %uuid, "timed out removing media record"),
                    }
                }
            }
        }
    }
}

pub struct MediaService {
    storage: Arc<dyn StorageBackend>,
    catalog: Arc<dyn MediaCatalog>,
    settings: MediaSettings,
}

impl MediaService {
    pub fn new(
        storage: Arc<dyn StorageBackend>,
        catalog: Arc<dyn MediaCatalog>,
        settings: MediaSettings,
    ) -> Self {
        Self {
            storage,
            catalog,
            settings,
        }
    }

    pub fn provider_name(&self) -> &str {
        self.storage.provider_name()
    }

    pub async fn upload(&self, file: UploadedFile) -> Result<UploadedMedia, MediaError> {
        // Validating
        self.validate(&file)?;

        // NamingOriginal
        let name = generate_file_name(&file.filename);

        // StoringOriginal
        let filename = self
            .upstream(
                Stage::StoringOriginal,
                self.storage.put(&name, &file.content_type, file.data.clone()),
            )
            .await?;

        // Both keys are removed on failure from here on, whether or not the
        // thumbnail was written.
        let mut compensation = self.compensation();
        compensation.push(CompensatingAction::DeleteBlob(filename.clone()));
        compensation.push(CompensatingAction::DeleteBlob(thumb_name(&filename)));

        match self
            .store_thumbnail_and_record(&filename, file.data, &mut compensation)
            .await
        {
            Ok(record) => {
                info!(id = record.id, uuid = %record.uuid, filename = %record.filename, "media uploaded");
                Ok(UploadedMedia {
                    url: self.storage.get(&record.filename),
                    thumb_url: self.storage.get(&record.thumb_filename),
                    id: record.id,
                    uuid: record.uuid,
                    filename: record.filename,
                    thumb_filename: record.thumb_filename,
                })
            }
            Err(e) => {
                compensation.unwind().await;
                Err(e)
            }
        }
    }

    fn compensation(&self) -> Compensation<'_> {
        Compensation::new(
            self.storage.as_ref(),
            self.catalog.as_ref(),
            self.settings.upstream_timeout,
        )
    }

    fn validate(&self, file: &UploadedFile) -> Result<(), MediaError> {
        let typ = &file.content_type;
        if !validate_mime(typ, IMAGE_MIMES) || !self.storage.supports(typ) {
            return Err(MediaError::BadInput(format!(
                "Unsupported file type ({}) uploaded.",
                typ
            )));
        }
        if file.data.is_empty() {
            return Err(MediaError::BadInput("Invalid file uploaded: file is empty".to_string()));
        }
        if file.data.len() > self.settings.max_upload_bytes {
            return Err(MediaError::BadInput(format!(
                "File too large: {} bytes, maximum is {} bytes",
                file.data.len(),
                self.settings.max_upload_bytes
            )));
        }
        Ok(())
    }

    async fn store_thumbnail_and_record(
        &self,
        filename: &str,
        data: Bytes,
        compensation: &mut Compensation<'_>,
    ) -> Result<MediaRecord, MediaError> {
        // Thumbnailing
        let max_pixels = self.settings.max_image_pixels;
        let thumb = tokio::task::spawn_blocking(move || image_processor::create_thumbnail(&data, max_pixels))
            .await
            .map_err(|e| {
                error!(error = %e, "thumbnail task failed");
                MediaError::upstream(Stage::Thumbnailing, e.to_string())
            })?
            .map_err(|e| match e {
                ThumbnailError::Decode(msg) => {
                    warn!(filename, error = %msg, "uploaded file is not a decodable image");
                    MediaError::Decode(msg)
                }
                e @ (ThumbnailError::TooLarge { .. } | ThumbnailError::ThumbnailTooLarge { .. }) => {
                    MediaError::BadInput(e.to_string())
                }
                ThumbnailError::Encode(msg) => {
                    error!(filename, error = %msg, "error resizing image");
                    MediaError::upstream(Stage::Thumbnailing, msg)
                }
            })?;

        // StoringThumbnail
        let thumb_filename = self
            .upstream(
                Stage::StoringThumbnail,
                self.storage.put(&thumb_name(filename), THUMBNAIL_MIME, Bytes::from(thumb)),
            )
            .await?;

        // RecordingCatalog. The identifier is only generated once both files
        // are stored.
        let uuid = Uuid::new_v4();
        compensation.push(CompensatingAction::DeleteRow(uuid));
        let new = NewMedia {
            uuid,
            filename: filename.to_string(),
            thumb_filename,
            provider: self.storage.provider_name().to_string(),
        };
        self.upstream(Stage::RecordingCatalog, self.catalog.insert_media(new))
            .await
    }

    pub async fn get_one(&self, id: i64) -> Result<Media, MediaError> {
        let id = check_id(id)?;
        let record = self
            .upstream(
                Stage::Reading,
                self.catalog.get_medium(self.storage.provider_name(), id),
            )
            .await?
            .ok_or_else(|| MediaError::NotFound("Media not found.".to_string()))?;

        let data = match tokio::time::timeout(
            self.settings.upstream_timeout,
            self.storage.get_data(&record.filename),
        )
        .await
        {
            Ok(data) => data,
            Err(_) => {
                warn!(filename = %record.filename, "timed out reading file data");
                None
            }
        };

        Ok(Media {
            data,
            ..self.resolve(record)
        })
    }

    pub async fn list_all(&self) -> Result<Vec<Media>, MediaError> {
        let records = self
            .upstream(
                Stage::Reading,
                self.catalog.list_media(self.storage.provider_name()),
            )
            .await?;

        // File contents are only read for single lookups.
        Ok(records.into_iter().map(|record| self.resolve(record)).collect())
    }

    /// Deletes the catalog row, then makes a best-effort attempt to remove
    /// both stored files.
    pub async fn delete(&self, id: i64) -> Result<(), MediaError> {
        let id = check_id(id)?;
        let record = self
            .upstream(Stage::Deleting, self.catalog.delete_media_returning(id))
            .await?
            .ok_or_else(|| MediaError::NotFound("Media not found.".to_string()))?;

        let mut cleanup = self.compensation();
        cleanup.push(CompensatingAction::DeleteBlob(thumb_name(&record.filename)));
        cleanup.push(CompensatingAction::DeleteBlob(record.filename.clone()));
        cleanup.unwind().await;

        info!(id = record.id, filename = %record.filename, "media deleted");
        Ok(())
    }

    fn resolve(&self, record: MediaRecord) -> Media {
        Media {
            url: self.storage.get(&record.filename),
            thumb_url: self.storage.get(&record.thumb_filename),
            supported_mime_types: self.storage.supported_mime_types(),
            data: None,
            id: record.id,
            uuid: record.uuid,
            filename: record.filename,
            thumb_filename: record.thumb_filename,
            provider: record.provider,
            created_at: record.created_at,
        }
    }

    /// Runs a storage or catalog call under the upstream timeout, logging the
    /// underlying error and returning an opaque one.
    async fn upstream<T, E, F>(&self, stage: Stage, fut: F) -> Result<T, MediaError>
    where
        E: fmt::Display,
        F: Future<Output = Result<T, E>>,
    {
        match tokio::time::timeout(self.settings.upstream_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                error!(stage = %stage, error = %e, "upstream call failed");
                Err(MediaError::upstream(stage, e.to_string()))
            }
            Err(_) => {
                error!(stage = %stage, timeout = ?self.settings.upstream_timeout, "upstream call timed out");
                Err(MediaError::upstream(
                    stage,
                    format!("timed out after {:?}", self.settings.upstream_timeout),
                ))
            }
        }
    }
}

fn check_id(id: i64) -> Result<i32, MediaError> {
    if id < 1 {
        return Err(MediaError::BadInput("Invalid ID.".to_string()));
    }
    i32::try_from(id).map_err(|_| MediaError::NotFound("Media not found.".to_string()))
}
