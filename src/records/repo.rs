use anyhow::Context;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// One persisted feeding-log entry. Created exactly once per successful
/// submission, never mutated, never deleted by this service.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FeedingRecord {
    pub id: Uuid,
    pub notes: Option<String>,
    pub image_url: Option<String>,
    pub created_at: OffsetDateTime,
}

/// Relational-store collaborator for feeding records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn insert(
        &self,
        notes: Option<&str>,
        image_url: Option<&str>,
    ) -> anyhow::Result<FeedingRecord>;

    /// All records, newest first. No pagination in current scope.
    async fn list(&self) -> anyhow::Result<Vec<FeedingRecord>>;
}

pub struct PgRecordStore {
    db: PgPool,
}

impl PgRecordStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl RecordStore for PgRecordStore {
    async fn insert(
        &self,
        notes: Option<&str>,
        image_url: Option<&str>,
    ) -> anyhow::Result<FeedingRecord> {
        let record = sqlx::query_as::<_, FeedingRecord>(
            r#"
            INSERT INTO feeding_records (notes, image_url)
            VALUES ($1, $2)
            RETURNING id, notes, image_url, created_at
            "#,
        )
        .bind(notes)
        .bind(image_url)
        .fetch_one(&self.db)
        .await
        .context("insert feeding record")?;
        Ok(record)
    }

    async fn list(&self) -> anyhow::Result<Vec<FeedingRecord>> {
        let rows = sqlx::query_as::<_, FeedingRecord>(
            r#"
            SELECT id, notes, image_url, created_at
            FROM feeding_records
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.db)
        .await
        .context("list feeding records")?;
        Ok(rows)
    }
}
