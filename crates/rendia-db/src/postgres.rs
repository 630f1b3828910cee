//! Postgres repository backed by sqlx.
//!
//! The versions map is stored as JSONB; kind and status are text columns
//! checked by the schema and parsed through the core enums' `FromStr`.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rendia_core::models::{MediaKind, MediaRecord, MediaStatus, VersionMap};
use rendia_core::AppError;
use sqlx::postgres::PgPool;
use sqlx::types::Json;
use sqlx::FromRow;
use uuid::Uuid;

use crate::repository::{CompletionDetails, MediaRecordRepository};

const SELECT_COLUMNS: &str = "id, owner_id, kind, declared_content_type, original_filename, \
     status, error_reason, versions, original_width, original_height, duration_seconds, \
     bitrate, codec, conversation_id, message_id, created_at, updated_at";

#[derive(Debug, FromRow)]
struct MediaRecordRow {
    id: Uuid,
    owner_id: Uuid,
    kind: String,
    declared_content_type: String,
    original_filename: String,
    status: String,
    error_reason: Option<String>,
    versions: Json<VersionMap>,
    original_width: Option<i32>,
    original_height: Option<i32>,
    duration_seconds: Option<f64>,
    bitrate: Option<i64>,
    codec: Option<String>,
    conversation_id: Option<String>,
    message_id: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl MediaRecordRow {
    fn into_record(self) -> Result<MediaRecord, AppError> {
        Ok(MediaRecord {
            id: self.id,
            owner_id: self.owner_id,
            kind: MediaKind::from_str(&self.kind).map_err(AppError::Database)?,
            declared_content_type: self.declared_content_type,
            original_filename: self.original_filename,
            status: MediaStatus::from_str(&self.status).map_err(AppError::Database)?,
            error_reason: self.error_reason,
            versions: self.versions.0,
            original_width: self.original_width.map(|v| v as u32),
            original_height: self.original_height.map(|v| v as u32),
            duration_seconds: self.duration_seconds,
            bitrate: self.bitrate.map(|v| v as u64),
            codec: self.codec,
            conversation_id: self.conversation_id,
            message_id: self.message_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

fn db_err(e: sqlx::Error) -> AppError {
    AppError::Database(e.to_string())
}

/// sqlx-backed media record store.
#[derive(Clone)]
pub struct PostgresMediaRecordRepository {
    pool: PgPool,
}

impl PostgresMediaRecordRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply embedded migrations. Called once at startup.
    pub async fn run_migrations(pool: &PgPool) -> Result<(), AppError> {
        sqlx::migrate!("./migrations")
            .run(pool)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}

#[async_trait]
impl MediaRecordRepository for PostgresMediaRecordRepository {
    async fn create(&self, record: &MediaRecord) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO media_records (id, owner_id, kind, declared_content_type, \
             original_filename, status, error_reason, versions, original_width, \
             original_height, duration_seconds, bitrate, codec, conversation_id, \
             message_id, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17)",
        )
        .bind(record.id)
        .bind(record.owner_id)
        .bind(record.kind.to_string())
        .bind(&record.declared_content_type)
        .bind(&record.original_filename)
        .bind(record.status.to_string())
        .bind(&record.error_reason)
        .bind(Json(record.versions.clone()))
        .bind(record.original_width.map(|v| v as i32))
        .bind(record.original_height.map(|v| v as i32))
        .bind(record.duration_seconds)
        .bind(record.bitrate.map(|v| v as i64))
        .bind(&record.codec)
        .bind(&record.conversation_id)
        .bind(&record.message_id)
        .bind(record.created_at)
        .bind(record.updated_at)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<MediaRecord>, AppError> {
        let row: Option<MediaRecordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM media_records WHERE id = $1",
            SELECT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(MediaRecordRow::into_record).transpose()
    }

    async fn get_owned(&self, owner_id: Uuid, id: Uuid) -> Result<Option<MediaRecord>, AppError> {
        let row: Option<MediaRecordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM media_records WHERE id = $1 AND owner_id = $2",
            SELECT_COLUMNS
        ))
        .bind(id)
        .bind(owner_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;

        row.map(MediaRecordRow::into_record).transpose()
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaRecord>, AppError> {
        let rows: Vec<MediaRecordRow> = sqlx::query_as(&format!(
            "SELECT {} FROM media_records WHERE owner_id = $1 ORDER BY created_at DESC",
            SELECT_COLUMNS
        ))
        .bind(owner_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(MediaRecordRow::into_record).collect()
    }

    async fn mark_processing_if_pending(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query(
            "UPDATE media_records SET status = 'processing', updated_at = NOW() \
             WHERE id = $1 AND status = 'pending'",
        )
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }

    async fn complete(
        &self,
        id: Uuid,
        versions: &VersionMap,
        details: &CompletionDetails,
    ) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE media_records SET status = 'completed', versions = $2, \
             error_reason = NULL, original_width = $3, original_height = $4, \
             duration_seconds = $5, bitrate = $6, codec = $7, updated_at = NOW() \
             WHERE id = $1 AND status = 'processing'",
        )
        .bind(id)
        .bind(Json(versions.clone()))
        .bind(details.original_width.map(|v| v as i32))
        .bind(details.original_height.map(|v| v as i32))
        .bind(details.duration_seconds)
        .bind(details.bitrate.map(|v| v as i64))
        .bind(&details.codec)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            tracing::warn!(media_id = %id, "Ignoring completion for a record not in processing");
        }
        Ok(())
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<(), AppError> {
        let result = sqlx::query(
            "UPDATE media_records SET status = 'failed', error_reason = $2, \
             versions = '{}'::jsonb, updated_at = NOW() \
             WHERE id = $1 AND status IN ('pending', 'processing')",
        )
        .bind(id)
        .bind(reason)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            tracing::warn!(media_id = %id, "Ignoring failure for a record already terminal");
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM media_records WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(db_err)?;

        Ok(result.rows_affected() == 1)
    }
}
