//! Repository trait for media records.

use async_trait::async_trait;
use rendia_core::models::{MediaRecord, VersionMap};
use rendia_core::AppError;
use uuid::Uuid;

/// Source metadata captured while a derivative engine runs, written to the
/// record on completion.
#[derive(Debug, Clone, Default)]
pub struct CompletionDetails {
    pub original_width: Option<u32>,
    pub original_height: Option<u32>,
    pub duration_seconds: Option<f64>,
    pub bitrate: Option<u64>,
    pub codec: Option<String>,
}

/// Persistent record of one ingestion's identity, status, and derivative
/// locations.
///
/// Status transitions go through dedicated methods rather than a generic
/// update so the monotonic state machine is enforced at the store:
/// `mark_processing_if_pending` is a compare-and-set and the only path from
/// `pending` to `processing`; `complete` and `mark_failed` only apply to a
/// record still in flight.
#[async_trait]
pub trait MediaRecordRepository: Send + Sync {
    /// Insert a freshly created pending record.
    async fn create(&self, record: &MediaRecord) -> Result<(), AppError>;

    async fn get(&self, id: Uuid) -> Result<Option<MediaRecord>, AppError>;

    /// Fetch a record only if `owner_id` owns it. Callers treat a miss and a
    /// foreign record identically (NotFound) to avoid leaking existence.
    async fn get_owned(&self, owner_id: Uuid, id: Uuid) -> Result<Option<MediaRecord>, AppError>;

    async fn list_by_owner(&self, owner_id: Uuid) -> Result<Vec<MediaRecord>, AppError>;

    /// Compare-and-set pending → processing. Returns false when the record
    /// is missing or already past pending, which makes a second confirmation
    /// call a no-op.
    async fn mark_processing_if_pending(&self, id: Uuid) -> Result<bool, AppError>;

    /// Transition processing → completed, replacing the versions map with
    /// the full rendition set and recording source metadata.
    async fn complete(
        &self,
        id: Uuid,
        versions: &VersionMap,
        details: &CompletionDetails,
    ) -> Result<(), AppError>;

    /// Transition to failed with a reason. The versions map is emptied so a
    /// partial rendition set is never visible.
    async fn mark_failed(&self, id: Uuid, reason: &str) -> Result<(), AppError>;

    /// Remove the record. Returns whether a record was actually removed.
    async fn delete(&self, id: Uuid) -> Result<bool, AppError>;
}
