//! In-memory collaborators that record every call made to them.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use sea_orm::DbErr;

use crate::services::catalog::{CatalogError, CatalogResult, MediaCatalog, MediaRecord, NewMedia};
use crate::services::storage::{StorageBackend, StorageError, StorageResult};
use crate::utils::mime::IMAGE_MIMES;

#[derive(Debug, Clone, PartialEq)]
pub enum StorageCall {
    Put { name: String, mime_type: String },
    GetData(String),
    Delete(String),
}

#[derive(Debug, Clone, Copy)]
pub enum PutFailure {
    Error,
    Hang,
}

#[derive(Default)]
pub struct RecordingStorage {
    calls: Mutex<Vec<StorageCall>>,
    blobs: Mutex<HashMap<String, (String, Bytes)>>,
    puts: AtomicUsize,
    fail_put: Option<(usize, PutFailure)>,
    fail_deletes: bool,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the `nth` put (1-based) fail.
    pub fn failing_put(mut self, nth: usize, failure: PutFailure) -> Self {
        self.fail_put = Some((nth, failure));
        self
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }

    pub fn calls(&self) -> Vec<StorageCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn puts(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StorageCall::Put { name, .. } => Some(name),
                _ => None,
            })
            .collect()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StorageCall::Delete(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Stored content type and bytes.
    pub fn blob(&self, name: &str) -> Option<(String, Bytes)> {
        self.blobs.lock().unwrap().get(name).cloned()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    fn record(&self, call: StorageCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl StorageBackend for RecordingStorage {
    fn provider_name(&self) -> &str {
        "test"
    }

    async fn put(&self, name: &str, mime_type: &str, content: Bytes) -> StorageResult<String> {
        self.record(StorageCall::Put {
            name: name.to_string(),
            mime_type: mime_type.to_string(),
        });
        let nth = self.puts.fetch_add(1, Ordering::SeqCst) + 1;

        match self.fail_put {
            Some((at, PutFailure::Error)) if at == nth => {
                return Err(StorageError::Backend("bucket unavailable".to_string()));
            }
            Some((at, PutFailure::Hang)) if at == nth => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            _ => {}
        }

        self.blobs
            .lock()
            .unwrap()
            .insert(name.to_string(), (mime_type.to_string(), content));
        Ok(name.to_string())
    }

    fn get(&self, name: &str) -> String {
        format!("https://cdn.test/{name}")
    }

    async fn get_data(&self, name: &str) -> Option<Bytes> {
        self.record(StorageCall::GetData(name.to_string()));
        self.blob(name).map(|(_, data)| data)
    }

    async fn delete(&self, name: &str) -> StorageResult<()> {
        self.record(StorageCall::Delete(name.to_string()));
        if self.fail_deletes {
            return Err(StorageError::Backend("delete refused".to_string()));
        }
        self.blobs.lock().unwrap().remove(name);
        Ok(())
    }

    fn supported_mime_types(&self) -> Vec<String> {
        IMAGE_MIMES.iter().map(|m| m.to_string()).collect()
    }
}

#[derive(Default)]
pub struct RecordingCatalog {
    rows: Mutex<Vec<MediaRecord>>,
    next_id: AtomicI32,
    calls: AtomicUsize,
    fail_insert: bool,
    stall_after_insert: bool,
}

impl RecordingCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_insert(mut self) -> Self {
        self.fail_insert = true;
        self
    }

    /// Stores the row, then never returns from the insert.
    pub fn stalling_insert(mut self) -> Self {
        self.stall_after_insert = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn rows(&self) -> Vec<MediaRecord> {
        self.rows.lock().unwrap().clone()
    }

    /// Seeds a row without counting it as a call.
    pub fn seed(&self, filename: &str, provider: &str) -> MediaRecord {
        let record = MediaRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            uuid: uuid::Uuid::new_v4(),
            filename: filename.to_string(),
            thumb_filename: format!("thumb_{filename}"),
            provider: provider.to_string(),
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(record.clone());
        record
    }

    fn hit(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl MediaCatalog for RecordingCatalog {
    async fn insert_media(&self, new: NewMedia) -> CatalogResult<MediaRecord> {
        self.hit();
        if self.fail_insert {
            return Err(CatalogError::Database(DbErr::Custom(
                "duplicate key value violates unique constraint".to_string(),
            )));
        }
        let record = MediaRecord {
            id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            uuid: new.uuid,
            filename: new.filename,
            thumb_filename: new.thumb_filename,
            provider: new.provider,
            created_at: Utc::now(),
        };
        self.rows.lock().unwrap().push(record.clone());
        if self.stall_after_insert {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(record)
    }

    async fn get_medium(&self, provider: &str, id: i32) -> CatalogResult<Option<MediaRecord>> {
        self.hit();
        Ok(self
            .rows
            .lock()
            .unwrap()
            .iter()
            .find(|r| r.id == id && r.provider == provider)
            .cloned())
    }

    async fn list_media(&self, provider: &str) -> CatalogResult<Vec<MediaRecord>> {
        self.hit();
        let mut rows: Vec<_> = self
            .rows
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.provider == provider)
            .cloned()
            .collect();
        rows.reverse();
        Ok(rows)
    }

    async fn delete_media_returning(&self, id: i32) -> CatalogResult<Option<MediaRecord>> {
        self.hit();
        let mut rows = self.rows.lock().unwrap();
        let pos = rows.iter().position(|r| r.id == id);
        Ok(pos.map(|i| rows.remove(i)))
    }

    async fn delete_media_by_uuid(&self, uuid: uuid::Uuid) -> CatalogResult<bool> {
        self.hit();
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|r| r.uuid != uuid);
        Ok(rows.len() < before)
    }
}
