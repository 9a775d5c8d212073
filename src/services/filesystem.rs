use std::io::ErrorKind;
use std::path::PathBuf;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::fs;
use tracing::{debug, warn};

use crate::services::storage::{validate_name, StorageBackend, StorageResult};
use crate::utils::mime::IMAGE_MIMES;

pub const PROVIDER_NAME: &str = "filesystem";

/// Stores media as flat files in a single upload directory.
///
/// The directory is expected to be served as static files under
/// `upload_uri`, which is what `get` links to.
pub struct FilesystemStorage {
    upload_path: PathBuf,
    upload_uri: String,
}

impl FilesystemStorage {
    pub fn new(upload_path: impl Into<PathBuf>, upload_uri: impl Into<String>) -> Self {
        Self {
            upload_path: upload_path.into(),
            upload_uri: upload_uri.into(),
        }
    }

    pub fn upload_path(&self) -> &PathBuf {
        &self.upload_path
    }

    fn full_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_name(name)?;
        Ok(self.upload_path.join(name))
    }
}

#[async_trait]
impl StorageBackend for FilesystemStorage {
    fn provider_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn put(&self, name: &str, mime_type: &str, content: Bytes) -> StorageResult<String> {
        let path = self.full_path(name)?;
        debug!(name, mime_type, size = content.len(), "filesystem: put");

        fs::create_dir_all(&self.upload_path).await?;
        fs::write(&path, &content).await?;

        Ok(name.to_string())
    }

    fn get(&self, name: &str) -> String {
        format!("{}/{}", self.upload_uri, name)
    }

    async fn get_data(&self, name: &str) -> Option<Bytes> {
        let path = self.full_path(name).ok()?;
        match fs::read(&path).await {
            Ok(data) => Some(Bytes::from(data)),
            Err(e) => {
                warn!(name, error = %e, "filesystem: could not read file");
                None
            }
        }
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        let path = self.full_path(name)?;
        debug!(name, "filesystem: delete");

        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(name, "filesystem: delete of missing file ignored");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    fn supported_mime_types(&self) -> Vec<String> {
        IMAGE_MIMES.iter().map(|m| m.to_string()).collect()
    }
}
