use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::LockType;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, NotSet, QueryFilter,
    QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::entities::media;

pub type CatalogResult<T> = Result<T, CatalogError>;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("database error: {0}")]
    Database(#[from] DbErr),
}

/// A catalog row describing one ingested asset and its thumbnail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaRecord {
    pub id: i32,
    pub uuid: Uuid,
    pub filename: String,
    pub thumb_filename: String,
    pub provider: String,
    pub created_at: DateTime<Utc>,
}

impl From<media::Model> for MediaRecord {
    fn from(model: media::Model) -> Self {
        Self {
            id: model.id,
            uuid: model.uuid,
            filename: model.filename,
            thumb_filename: model.thumb_filename,
            provider: model.provider,
            created_at: model.created_at.with_timezone(&Utc),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewMedia {
    pub uuid: Uuid,
    pub filename: String,
    pub thumb_filename: String,
    pub provider: String,
}

#[async_trait]
pub trait MediaCatalog: Send + Sync {
    async fn insert_media(&self, media: NewMedia) -> CatalogResult<MediaRecord>;

    async fn get_medium(&self, provider: &str, id: i32) -> CatalogResult<Option<MediaRecord>>;

    /// All rows for `provider`, newest first.
    async fn list_media(&self, provider: &str) -> CatalogResult<Vec<MediaRecord>>;

    /// Removes the row and hands it back, or `None` if there was no such row.
    async fn delete_media_returning(&self, id: i32) -> CatalogResult<Option<MediaRecord>>;

    /// Removes the row carrying `uuid`. Returns whether a row was removed.
    async fn delete_media_by_uuid(&self, uuid: Uuid) -> CatalogResult<bool>;
}

#[derive(Clone)]
pub struct SeaOrmCatalog {
    db: Arc<DatabaseConnection>,
}

impl SeaOrmCatalog {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db: Arc::new(db) }
    }
}

#[async_trait]
impl MediaCatalog for SeaOrmCatalog {
    async fn insert_media(&self, new: NewMedia) -> CatalogResult<MediaRecord> {
        let row = media::ActiveModel {
            id: NotSet,
            uuid: Set(new.uuid),
            filename: Set(new.filename),
            thumb_filename: Set(new.thumb_filename),
            provider: Set(new.provider),
            created_at: Set(Utc::now().fixed_offset()),
        };

        let saved = row.insert(self.db.as_ref()).await?;
        Ok(saved.into())
    }

    async fn get_medium(&self, provider: &str, id: i32) -> CatalogResult<Option<MediaRecord>> {
        let row = media::Entity::find_by_id(id)
            .filter(media::Column::Provider.eq(provider))
            .one(self.db.as_ref())
            .await?;
        Ok(row.map(MediaRecord::from))
    }

    async fn list_media(&self, provider: &str) -> CatalogResult<Vec<MediaRecord>> {
        let rows = media::Entity::find()
            .filter(media::Column::Provider.eq(provider))
            .order_by_desc(media::Column::CreatedAt)
            .order_by_desc(media::Column::Id)
            .all(self.db.as_ref())
            .await?;
        Ok(rows.into_iter().map(MediaRecord::from).collect())
    }

    async fn delete_media_returning(&self, id: i32) -> CatalogResult<Option<MediaRecord>> {
        let txn = self.db.begin().await?;

        let row = media::Entity::find_by_id(id)
            .lock(LockType::Update)
            .one(&txn)
            .await?;

        let Some(row) = row else {
            txn.rollback().await?;
            return Ok(None);
        };

        let res = media::Entity::delete_by_id(id).exec(&txn).await?;
        if res.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(None);
        }

        txn.commit().await?;
        Ok(Some(row.into()))
    }

    async fn delete_media_by_uuid(&self, uuid: Uuid) -> CatalogResult<bool> {
        let res = media::Entity::delete_many()
            .filter(media::Column::Uuid.eq(uuid))
            .exec(self.db.as_ref())
            .await?;
        Ok(res.rows_affected > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn model(id: i32) -> media::Model {
        media::Model {
            id,
            uuid: Uuid::new_v4(),
            filename: format!("{id:032}.jpg"),
            thumb_filename: format!("thumb_{id:032}.jpg"),
            provider: "filesystem".to_string(),
            created_at: Utc::now().fixed_offset(),
        }
    }

    #[tokio::test]
    async fn insert_returns_typed_record() {
        let stored = model(7);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored.clone()]])
            .into_connection();
        let catalog = SeaOrmCatalog::new(db);

        let record = catalog
            .insert_media(NewMedia {
                uuid: stored.uuid,
                filename: stored.filename.clone(),
                thumb_filename: stored.thumb_filename.clone(),
                provider: stored.provider.clone(),
            })
            .await
            .unwrap();

        assert_eq!(record, MediaRecord::from(stored));
    }

    #[tokio::test]
    async fn get_medium_maps_missing_row_to_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<media::Model>::new()])
            .into_connection();
        let catalog = SeaOrmCatalog::new(db);

        assert!(catalog.get_medium("filesystem", 3).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_returns_removed_row() {
        let stored = model(3);
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![stored.clone()]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();
        let catalog = SeaOrmCatalog::new(db);

        let removed = catalog.delete_media_returning(3).await.unwrap();
        assert_eq!(removed, Some(MediaRecord::from(stored)));
    }

    #[tokio::test]
    async fn delete_of_missing_row_is_none() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<media::Model>::new()])
            .into_connection();
        let catalog = SeaOrmCatalog::new(db);

        assert!(catalog.delete_media_returning(42).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_by_uuid_reports_whether_a_row_went() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 0,
                },
            ])
            .into_connection();
        let catalog = SeaOrmCatalog::new(db);

        let uuid = Uuid::new_v4();
        assert!(catalog.delete_media_by_uuid(uuid).await.unwrap());
        assert!(!catalog.delete_media_by_uuid(uuid).await.unwrap());
    }

    #[tokio::test]
    async fn database_errors_surface() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_errors([DbErr::Custom("connection reset".to_string())])
            .into_connection();
        let catalog = SeaOrmCatalog::new(db);

        let err = catalog.list_media("filesystem").await.unwrap_err();
        assert!(matches!(err, CatalogError::Database(_)));
    }
}
