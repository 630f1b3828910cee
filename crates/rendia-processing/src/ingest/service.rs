//! Media ingestion service.
//!
//! Owns the full lifecycle: issue a presigned upload ticket and a pending
//! record, gate the client's confirmation (verify the object exists, win the
//! pending→processing transition exactly once, detach derivative
//! generation), and coordinate deletion. Background work never propagates
//! errors upward; every failure lands on the record as a `failed` status
//! with a reason.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future;
use rendia_core::models::{MediaKind, MediaRecord, MediaStatus};
use rendia_core::{AppError, ImageDerivativeConfig, VideoDerivativeConfig};
use rendia_db::repository::{CompletionDetails, MediaRecordRepository};
use rendia_storage::keys;
use rendia_storage::ObjectStorage;
use uuid::Uuid;

use crate::error::ProcessingError;
use crate::image::ImageDerivativeEngine;
use crate::ingest::notifier::SearchIndexNotifier;
use crate::video::VideoDerivativeEngine;

/// Issued at intake: where the client uploads, and which record to confirm.
#[derive(Debug, Clone)]
pub struct UploadTicket {
    pub media_id: Uuid,
    pub storage_key: String,
    pub presigned_url: String,
}

/// Outcome of a confirmation attempt. `accepted` is true only for the one
/// call that won the pending→processing transition and detached the work.
#[derive(Debug, Clone)]
pub struct ConfirmReceipt {
    pub media_id: Uuid,
    pub status: MediaStatus,
    pub accepted: bool,
}

/// Per-key outcome of a deletion fan-out.
#[derive(Debug, Clone)]
pub struct DeletionReport {
    pub media_id: Uuid,
    pub deleted: Vec<String>,
    /// Keys whose delete failed, with the reason. The record is removed
    /// regardless; these objects need an out-of-band sweep.
    pub failed: Vec<(String, String)>,
}

/// Shared guts of the service. Kept behind an `Arc` so the confirmation
/// gate can hand a clone to the detached processing task.
struct IngestInner {
    repository: Arc<dyn MediaRecordRepository>,
    storage: Arc<dyn ObjectStorage>,
    notifier: Arc<dyn SearchIndexNotifier>,
    image_engine: ImageDerivativeEngine,
    video_engine: VideoDerivativeEngine,
    presign_ttl: Duration,
}

#[derive(Clone)]
pub struct MediaIngestService {
    inner: Arc<IngestInner>,
}

impl MediaIngestService {
    pub fn new(
        repository: Arc<dyn MediaRecordRepository>,
        storage: Arc<dyn ObjectStorage>,
        notifier: Arc<dyn SearchIndexNotifier>,
        image_config: ImageDerivativeConfig,
        video_config: VideoDerivativeConfig,
        presign_ttl: Duration,
    ) -> Result<Self, ProcessingError> {
        let image_engine = ImageDerivativeEngine::new(Arc::clone(&storage), image_config);
        let video_engine = VideoDerivativeEngine::new(Arc::clone(&storage), video_config)?;
        Ok(Self {
            inner: Arc::new(IngestInner {
                repository,
                storage,
                notifier,
                image_engine,
                video_engine,
                presign_ttl,
            }),
        })
    }

    /// Intake: classify the declared content type, allocate a storage key,
    /// presign a direct PUT, and persist the pending record. Nothing is
    /// uploaded here; the client talks to the object store directly.
    #[tracing::instrument(skip(self), fields(owner_id = %owner_id))]
    pub async fn request_upload(
        &self,
        owner_id: Uuid,
        filename: &str,
        content_type: &str,
        conversation_id: Option<String>,
        message_id: Option<String>,
    ) -> Result<UploadTicket, AppError> {
        let kind = MediaKind::from_content_type(content_type).ok_or_else(|| {
            AppError::UnsupportedMediaType(format!("Unsupported content type: {}", content_type))
        })?;

        let media_id = Uuid::new_v4();
        let storage_key = keys::original_key(kind, owner_id, Utc::now(), media_id, filename);
        let presigned_url = self
            .inner
            .storage
            .presigned_put_url(&storage_key, content_type, self.inner.presign_ttl)
            .await?;

        let record = MediaRecord::new_pending(
            media_id,
            owner_id,
            kind,
            content_type.to_string(),
            filename.to_string(),
            storage_key.clone(),
            conversation_id,
            message_id,
        );
        self.inner.repository.create(&record).await?;

        tracing::info!(media_id = %media_id, kind = %kind, key = %storage_key, "Upload ticket issued");
        Ok(UploadTicket {
            media_id,
            storage_key,
            presigned_url,
        })
    }

    /// Confirmation gate. Verifies an object actually exists at the
    /// allocated key, claims the pending→processing transition with a
    /// compare-and-set so concurrent confirmations detach the work at most
    /// once, and spawns derivative generation in the background.
    ///
    /// Confirming a record that already left `pending` is a no-op reporting
    /// the current status.
    #[tracing::instrument(skip(self), fields(media_id = %media_id, owner_id = %owner_id))]
    pub async fn confirm_upload(
        &self,
        owner_id: Uuid,
        media_id: Uuid,
    ) -> Result<ConfirmReceipt, AppError> {
        let record = self
            .inner
            .repository
            .get_owned(owner_id, media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media not found: {}", media_id)))?;

        if record.status != MediaStatus::Pending {
            tracing::debug!(status = %record.status, "Confirmation of a non-pending record is a no-op");
            return Ok(ConfirmReceipt {
                media_id,
                status: record.status,
                accepted: false,
            });
        }

        let key = record
            .original_key()
            .ok_or_else(|| {
                AppError::BadRequest(format!("Record {} has no original storage key", media_id))
            })?
            .to_string();

        // Verification is terminal either way: a missing object and an
        // erroring HEAD both fail the record.
        match self.inner.storage.head(&key).await {
            Ok(Some(info)) => {
                tracing::debug!(size_bytes = info.size, "Upload verified");
            }
            Ok(None) => {
                self.inner
                    .repository
                    .mark_failed(media_id, "Upload verification failed: no object at the allocated key")
                    .await?;
                return Err(AppError::BadRequest(
                    "Upload verification failed: no object was uploaded for this media".to_string(),
                ));
            }
            Err(err) => {
                let reason = format!("Upload verification failed: {}", err);
                self.inner.repository.mark_failed(media_id, &reason).await?;
                return Err(err.into());
            }
        }

        if !self.inner.repository.mark_processing_if_pending(media_id).await? {
            // Lost the race with a concurrent confirmation.
            let status = self
                .inner
                .repository
                .get(media_id)
                .await?
                .map(|r| r.status)
                .unwrap_or(MediaStatus::Processing);
            return Ok(ConfirmReceipt {
                media_id,
                status,
                accepted: false,
            });
        }

        let mut claimed = record;
        claimed.status = MediaStatus::Processing;
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            inner.process_record(claimed).await;
        });

        Ok(ConfirmReceipt {
            media_id,
            status: MediaStatus::Processing,
            accepted: true,
        })
    }

    /// Deletion coordinator: best-effort fan-out delete of every referenced
    /// object, then removal of the record regardless of per-key outcomes.
    #[tracing::instrument(skip(self), fields(media_id = %media_id, owner_id = %owner_id))]
    pub async fn delete_media(
        &self,
        owner_id: Uuid,
        media_id: Uuid,
    ) -> Result<DeletionReport, AppError> {
        let record = self
            .inner
            .repository
            .get_owned(owner_id, media_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Media not found: {}", media_id)))?;

        let keys = record.storage_keys();
        let results = future::join_all(keys.into_iter().map(|key| {
            let storage = Arc::clone(&self.inner.storage);
            async move {
                let result = storage.delete(&key).await;
                (key, result)
            }
        }))
        .await;

        let mut deleted = Vec::new();
        let mut failed = Vec::new();
        for (key, result) in results {
            match result {
                Ok(()) => deleted.push(key),
                Err(err) => {
                    tracing::warn!(key = %key, error = %err, "Object delete failed");
                    failed.push((key, err.to_string()));
                }
            }
        }

        self.inner.repository.delete(media_id).await?;
        tracing::info!(
            deleted = deleted.len(),
            failed = failed.len(),
            "Media deleted"
        );

        let notifier = Arc::clone(&self.inner.notifier);
        tokio::spawn(async move {
            if let Err(err) = notifier.media_deleted(media_id, owner_id).await {
                tracing::warn!(media_id = %media_id, error = %err, "Search index notification failed");
            }
        });

        Ok(DeletionReport {
            media_id,
            deleted,
            failed,
        })
    }
}

impl IngestInner {
    /// Background derivative generation. Never returns an error to the
    /// spawning task; any failure becomes a `failed` record with a reason.
    async fn process_record(&self, record: MediaRecord) {
        let media_id = record.id;
        if let Err(err) = self.generate_derivatives(&record).await {
            tracing::error!(media_id = %media_id, error = %err, "Derivative generation failed");
            if let Err(db_err) = self.repository.mark_failed(media_id, &err.to_string()).await {
                tracing::error!(
                    media_id = %media_id,
                    error = %db_err,
                    "Failed to persist the failed status"
                );
            }
        }
    }

    async fn generate_derivatives(&self, record: &MediaRecord) -> Result<(), AppError> {
        let key = record.original_key().ok_or_else(|| {
            AppError::Internal(format!("Record {} has no original storage key", record.id))
        })?;
        let data = self.storage.get(key).await?;

        let (versions, details) = match record.kind {
            MediaKind::Image => {
                let set = self.image_engine.generate(key, data).await?;
                let details = CompletionDetails {
                    original_width: Some(set.source_width),
                    original_height: Some(set.source_height),
                    ..CompletionDetails::default()
                };
                (set.versions, details)
            }
            MediaKind::Video => {
                let set = self.video_engine.generate(key, data).await?;
                let details = CompletionDetails {
                    original_width: Some(set.metadata.width),
                    original_height: Some(set.metadata.height),
                    duration_seconds: Some(set.metadata.duration),
                    bitrate: set.metadata.bitrate,
                    codec: Some(set.metadata.codec.clone()),
                };
                (set.versions, details)
            }
        };

        self.repository.complete(record.id, &versions, &details).await?;
        tracing::info!(media_id = %record.id, renditions = versions.len(), "Media completed");

        if let Some(completed) = self.repository.get(record.id).await? {
            let notifier = Arc::clone(&self.notifier);
            tokio::spawn(async move {
                if let Err(err) = notifier.media_completed(&completed).await {
                    tracing::warn!(
                        media_id = %completed.id,
                        error = %err,
                        "Search index notification failed"
                    );
                }
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
    use rendia_core::models::version;
    use rendia_db::memory::InMemoryMediaRecordRepository;
    use rendia_storage::traits::{ObjectInfo, StorageResult};
    use rendia_storage::LocalObjectStorage;
    use std::io::Cursor;
    use tempfile::TempDir;

    use crate::ingest::notifier::LogSearchIndexNotifier;

    /// Per-operation failure injection for the wrapper below.
    #[derive(Default)]
    struct Faults {
        put_containing: Option<String>,
        delete_containing: Option<String>,
        head_errors: bool,
    }

    /// Wrapper that fails selected operations for keys containing a marker.
    struct FlakyStorage {
        inner: Arc<dyn ObjectStorage>,
        faults: Faults,
    }

    #[async_trait]
    impl ObjectStorage for FlakyStorage {
        async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String> {
            if let Some(marker) = &self.faults.put_containing {
                if key.contains(marker) {
                    return Err(rendia_storage::StorageError::UploadFailed(format!(
                        "injected failure for {}",
                        key
                    )));
                }
            }
            self.inner.put(key, data, content_type).await
        }

        async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
            self.inner.get(key).await
        }

        async fn head(&self, key: &str) -> StorageResult<Option<ObjectInfo>> {
            if self.faults.head_errors {
                return Err(rendia_storage::StorageError::BackendError(
                    "injected backend outage".to_string(),
                ));
            }
            self.inner.head(key).await
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            if let Some(marker) = &self.faults.delete_containing {
                if key.contains(marker) {
                    return Err(rendia_storage::StorageError::DeleteFailed(format!(
                        "injected failure for {}",
                        key
                    )));
                }
            }
            self.inner.delete(key).await
        }

        async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
            self.inner.list(prefix).await
        }

        async fn presigned_put_url(
            &self,
            key: &str,
            content_type: &str,
            expires_in: Duration,
        ) -> StorageResult<String> {
            self.inner.presigned_put_url(key, content_type, expires_in).await
        }

        async fn presigned_get_url(
            &self,
            key: &str,
            expires_in: Duration,
        ) -> StorageResult<String> {
            self.inner.presigned_get_url(key, expires_in).await
        }

        fn public_url(&self, key: &str) -> String {
            self.inner.public_url(key)
        }

        fn backend_type(&self) -> rendia_core::StorageBackend {
            self.inner.backend_type()
        }
    }

    struct Harness {
        service: Arc<MediaIngestService>,
        repository: Arc<dyn MediaRecordRepository>,
        storage: Arc<dyn ObjectStorage>,
        _dir: TempDir,
    }

    async fn harness(faults: Faults) -> Harness {
        let dir = TempDir::new().unwrap();
        let local: Arc<dyn ObjectStorage> = Arc::new(
            LocalObjectStorage::new(dir.path(), "http://localhost:3000/files".to_string())
                .await
                .unwrap(),
        );
        let storage: Arc<dyn ObjectStorage> = Arc::new(FlakyStorage {
            inner: local,
            faults,
        });
        let repository: Arc<dyn MediaRecordRepository> =
            Arc::new(InMemoryMediaRecordRepository::new());
        let service = Arc::new(
            MediaIngestService::new(
                Arc::clone(&repository),
                Arc::clone(&storage),
                Arc::new(LogSearchIndexNotifier),
                ImageDerivativeConfig {
                    original_max: 64,
                    thumbnail_size: 8,
                    small_size: 16,
                    medium_size: 24,
                    large_size: 32,
                    quality: 90,
                },
                VideoDerivativeConfig::default(),
                Duration::from_secs(900),
            )
            .unwrap(),
        );
        Harness {
            service,
            repository,
            storage,
            _dir: dir,
        }
    }

    fn png_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
            width,
            height,
            Rgba([10, 200, 30, 255]),
        ));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
        buf
    }

    async fn wait_terminal(repository: &Arc<dyn MediaRecordRepository>, id: Uuid) -> MediaRecord {
        for _ in 0..200 {
            if let Some(record) = repository.get(id).await.unwrap() {
                if record.status.is_terminal() {
                    return record;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("record {} never reached a terminal state", id);
    }

    #[tokio::test]
    async fn test_request_upload_creates_pending_record() {
        let h = harness(Faults::default()).await;
        let owner = Uuid::new_v4();

        let ticket = h
            .service
            .request_upload(owner, "photo.png", "image/png", None, None)
            .await
            .unwrap();

        assert!(ticket.storage_key.starts_with(&format!("images/{}/", owner)));
        assert!(!ticket.presigned_url.is_empty());

        let record = h.repository.get(ticket.media_id).await.unwrap().unwrap();
        assert_eq!(record.status, MediaStatus::Pending);
        assert_eq!(record.original_key(), Some(ticket.storage_key.as_str()));
        assert_eq!(record.kind, MediaKind::Image);
    }

    #[tokio::test]
    async fn test_request_upload_rejects_unsupported_type() {
        let h = harness(Faults::default()).await;
        let result = h
            .service
            .request_upload(Uuid::new_v4(), "doc.pdf", "application/pdf", None, None)
            .await;
        assert!(matches!(result, Err(AppError::UnsupportedMediaType(_))));
    }

    #[tokio::test]
    async fn test_confirm_without_object_fails_the_record() {
        let h = harness(Faults::default()).await;
        let owner = Uuid::new_v4();
        let ticket = h
            .service
            .request_upload(owner, "photo.png", "image/png", None, None)
            .await
            .unwrap();

        let result = h.service.confirm_upload(owner, ticket.media_id).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));

        let record = h.repository.get(ticket.media_id).await.unwrap().unwrap();
        assert_eq!(record.status, MediaStatus::Failed);
        assert!(record.error_reason.is_some());
        assert!(record.versions.is_empty());
    }

    #[tokio::test]
    async fn test_full_image_flow_reaches_completed() {
        let h = harness(Faults::default()).await;
        let owner = Uuid::new_v4();
        let ticket = h
            .service
            .request_upload(owner, "photo.png", "image/png", None, None)
            .await
            .unwrap();

        // Simulate the client's direct upload.
        h.storage
            .put(&ticket.storage_key, png_bytes(128, 96), "image/png")
            .await
            .unwrap();

        let receipt = h.service.confirm_upload(owner, ticket.media_id).await.unwrap();
        assert!(receipt.accepted);
        assert_eq!(receipt.status, MediaStatus::Processing);

        let record = wait_terminal(&h.repository, ticket.media_id).await;
        assert_eq!(record.status, MediaStatus::Completed);
        assert!(record.has_complete_rendition_set());
        assert_eq!(record.original_width, Some(128));
        assert_eq!(record.original_height, Some(96));
        for name in version::IMAGE_SET {
            let rendition = &record.versions[name];
            assert!(rendition.url.is_some(), "{} has no url", name);
            assert!(
                h.storage
                    .head(&rendition.storage_key)
                    .await
                    .unwrap()
                    .is_some(),
                "{} missing in store",
                name
            );
        }
    }

    #[tokio::test]
    async fn test_confirmation_is_idempotent() {
        let h = harness(Faults::default()).await;
        let owner = Uuid::new_v4();
        let ticket = h
            .service
            .request_upload(owner, "photo.png", "image/png", None, None)
            .await
            .unwrap();
        h.storage
            .put(&ticket.storage_key, png_bytes(32, 32), "image/png")
            .await
            .unwrap();

        let first = h.service.confirm_upload(owner, ticket.media_id).await.unwrap();
        assert!(first.accepted);

        // Second confirmation must not re-dispatch.
        let second = h.service.confirm_upload(owner, ticket.media_id).await.unwrap();
        assert!(!second.accepted);

        let record = wait_terminal(&h.repository, ticket.media_id).await;
        assert_eq!(record.status, MediaStatus::Completed);

        // Confirming a terminal record is still a no-op.
        let third = h.service.confirm_upload(owner, ticket.media_id).await.unwrap();
        assert!(!third.accepted);
        assert_eq!(third.status, MediaStatus::Completed);
    }

    #[tokio::test]
    async fn test_rendition_failure_is_all_or_nothing() {
        let h = harness(Faults {
            put_containing: Some("_large".to_string()),
            ..Faults::default()
        })
        .await;
        let owner = Uuid::new_v4();
        let ticket = h
            .service
            .request_upload(owner, "photo.png", "image/png", None, None)
            .await
            .unwrap();
        h.storage
            .put(&ticket.storage_key, png_bytes(128, 96), "image/png")
            .await
            .unwrap();

        h.service.confirm_upload(owner, ticket.media_id).await.unwrap();
        let record = wait_terminal(&h.repository, ticket.media_id).await;

        assert_eq!(record.status, MediaStatus::Failed);
        assert!(record.error_reason.is_some());
        // No partial rendition set survives a branch failure.
        assert!(record.versions.is_empty());
    }

    #[tokio::test]
    async fn test_delete_removes_objects_and_record() {
        let h = harness(Faults::default()).await;
        let owner = Uuid::new_v4();
        let ticket = h
            .service
            .request_upload(owner, "photo.png", "image/png", None, None)
            .await
            .unwrap();
        h.storage
            .put(&ticket.storage_key, png_bytes(128, 96), "image/png")
            .await
            .unwrap();
        h.service.confirm_upload(owner, ticket.media_id).await.unwrap();
        let record = wait_terminal(&h.repository, ticket.media_id).await;
        let keys = record.storage_keys();
        assert_eq!(keys.len(), version::IMAGE_SET.len());

        let report = h.service.delete_media(owner, ticket.media_id).await.unwrap();
        assert_eq!(report.deleted.len(), keys.len());
        assert!(report.failed.is_empty());

        for key in keys {
            assert!(h.storage.head(&key).await.unwrap().is_none());
        }
        assert!(h.repository.get(ticket.media_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_confirm_with_missing_original_key_is_bad_request() {
        let h = harness(Faults::default()).await;
        let owner = Uuid::new_v4();
        let mut record = MediaRecord::new_pending(
            Uuid::new_v4(),
            owner,
            MediaKind::Image,
            "image/png".to_string(),
            "photo.png".to_string(),
            "images/x.png".to_string(),
            None,
            None,
        );
        record.versions.clear();
        h.repository.create(&record).await.unwrap();

        let result = h.service.confirm_upload(owner, record.id).await;
        assert!(matches!(result, Err(AppError::BadRequest(_))));
    }

    #[tokio::test]
    async fn test_backend_error_during_verification_fails_the_record() {
        let h = harness(Faults {
            head_errors: true,
            ..Faults::default()
        })
        .await;
        let owner = Uuid::new_v4();
        let ticket = h
            .service
            .request_upload(owner, "photo.png", "image/png", None, None)
            .await
            .unwrap();
        h.storage
            .put(&ticket.storage_key, png_bytes(32, 32), "image/png")
            .await
            .unwrap();

        let result = h.service.confirm_upload(owner, ticket.media_id).await;
        assert!(matches!(result, Err(AppError::Storage(_))));

        // An erroring verification is as terminal as a missing object.
        let record = h.repository.get(ticket.media_id).await.unwrap().unwrap();
        assert_eq!(record.status, MediaStatus::Failed);
        assert!(record.error_reason.is_some());
    }

    #[tokio::test]
    async fn test_partial_delete_failure_is_reported_per_key() {
        let h = harness(Faults {
            delete_containing: Some("_small".to_string()),
            ..Faults::default()
        })
        .await;
        let owner = Uuid::new_v4();
        let ticket = h
            .service
            .request_upload(owner, "photo.png", "image/png", None, None)
            .await
            .unwrap();
        h.storage
            .put(&ticket.storage_key, png_bytes(128, 96), "image/png")
            .await
            .unwrap();
        h.service.confirm_upload(owner, ticket.media_id).await.unwrap();
        let record = wait_terminal(&h.repository, ticket.media_id).await;
        let keys = record.storage_keys();

        let report = h.service.delete_media(owner, ticket.media_id).await.unwrap();
        assert_eq!(report.failed.len(), 1);
        assert!(report.failed[0].0.contains("_small"));
        assert_eq!(report.deleted.len(), keys.len() - 1);

        // The record is removed even though one object survived.
        assert!(h.repository.get(ticket.media_id).await.unwrap().is_none());
        for key in keys {
            let present = h.storage.head(&key).await.unwrap().is_some();
            assert_eq!(present, key.contains("_small"), "unexpected state for {}", key);
        }
    }

    #[tokio::test]
    async fn test_foreign_owner_cannot_confirm_or_delete() {
        let h = harness(Faults::default()).await;
        let owner = Uuid::new_v4();
        let ticket = h
            .service
            .request_upload(owner, "photo.png", "image/png", None, None)
            .await
            .unwrap();

        let stranger = Uuid::new_v4();
        assert!(matches!(
            h.service.confirm_upload(stranger, ticket.media_id).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            h.service.delete_media(stranger, ticket.media_id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
