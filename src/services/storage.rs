//! Storage capability consumed by the ingestion workflows.
//!
//! A backend addresses blobs by name. `delete` on a name that was never
//! stored must succeed, because compensation always removes both the
//! original and its thumbnail key regardless of how far an upload got.

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;

use crate::utils::mime::validate_mime;

pub type StorageResult<T> = Result<T, StorageError>;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Storage backend error: {0}")]
    Backend(String),

    #[error("Invalid name: {0}")]
    InvalidName(String),
}

#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Identifies this backend in catalog rows.
    fn provider_name(&self) -> &str;

    /// Stores `content` under `name` and returns the name it was stored as.
    async fn put(&self, name: &str, mime_type: &str, content: Bytes) -> StorageResult<String>;

    /// Public URL for a stored blob.
    fn get(&self, name: &str) -> String;

    /// Raw bytes for backends that can serve them directly, `None` otherwise.
    async fn get_data(&self, name: &str) -> Option<Bytes>;

    async fn delete(&self, name: &str) -> StorageResult<()>;

    fn supported_mime_types(&self) -> Vec<String>;

    fn supports(&self, mime_type: &str) -> bool {
        validate_mime(mime_type, &self.supported_mime_types())
    }
}

/// Rejects names that could escape the backend's namespace.
pub(crate) fn validate_name(name: &str) -> StorageResult<()> {
    if name.is_empty()
        || name.starts_with('.')
        || name.contains("..")
        || name.contains('/')
        || name.contains('\\')
    {
        return Err(StorageError::InvalidName(name.to_string()));
    }
    Ok(())
}
