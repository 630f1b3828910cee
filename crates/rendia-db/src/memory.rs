//! In-memory repository for tests and ephemeral deployments.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use rendia_core::models::{MediaRecord, MediaStatus, VersionMap};
use rendia_core::AppError;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::repository::{CompletionDetails, MediaRecordRepository};

/// HashMap-backed implementation with the same transition semantics as the
/// Postgres store.
#[derive(Clone, Default)]
pub struct InMemoryMediaRecordRepository {
    records: Arc<RwLock<HashMap<Uuid, MediaRecord>>>,
}

impl InMemoryMediaRecordRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl MediaRecordRepository for InMemoryMediaRecordRepository {
    async fn create(&self, record: &MediaRecord) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(AppError::Database(format!(
                "Duplicate media record id: {}",
                record.id
            )));
        }
        records.insert(record.id, record.clone());
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<MediaRecord>, AppError> {
        Ok(self.records.read().await.get(&id).cloned())
    }

    async fn get_owned(&self, owner_id: Uuid, id: Uuid) -> Result<Option<MediaRecord>, AppError> {
        Ok(self
            .records
            .read()
            .await
            .get(&id)
            .filter(|r| r.owner_id == owner_id)
            .cloned())
    }

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaRecord>, AppError> {
        let mut records: Vec<MediaRecord> = self
            .records
            .read()
            .await
            .values()
            .filter(|r| r.owner_id == owner_id)
            .cloned()
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(records)
    }

    async fn mark_processing_if_pending(&self, id: Uuid) -> Result<bool, AppError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) if record.status == MediaStatus::Pending => {
                record.status = MediaStatus::Processing;
                record.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn complete(
        &self,
        id: Uuid,
        versions: &VersionMap,
        details: &CompletionDetails,
    ) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        match records.get_mut(&id) {
            Some(record) if record.status == MediaStatus::Processing => {
                record.status = MediaStatus::Completed;
                record.versions = versions.clone();
                record.error_reason = None;
                record.original_width = details.original_width;
                record.original_height = details.original_height;
                record.duration_seconds = details.duration_seconds;
                record.bitrate = details.bitrate;
                record.codec = details.codec.clone();
                record.updated_at = Utc::now();
                Ok(())
            }
            Some(record) => {
                tracing::warn!(
                    media_id = %id,
                    status = %record.status,
                    "Ignoring completion for a record not in processing"
                );
                Ok(())
            }
            None => Ok(()),
        }
    }

    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(&id) {
            if record.status.can_transition_to(MediaStatus::Failed) {
                record.status = MediaStatus::Failed;
                record.error_reason = Some(reason.to_string());
                record.versions = VersionMap::new();
                record.updated_at = Utc::now();
            } else {
                tracing::warn!(
                    media_id = %id,
                    status = %record.status,
                    "Ignoring failure for a record already terminal"
                );
            }
        }
        Ok(())
    }

    async fn delete(&self, id: Uuid) -> Result<bool, AppError> {
        Ok(self.records.write().await.remove(&id).is_some())
    }
}
