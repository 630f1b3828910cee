//! Search index notifications.
//!
//! Lifecycle events fan out to the search indexer on a fire-and-forget
//! basis: failures are logged and never affect the media record. The
//! default implementation only logs; deployments with a real indexer plug
//! in their own implementation.

use async_trait::async_trait;
use rendia_core::models::MediaRecord;
use uuid::Uuid;

#[async_trait]
pub trait SearchIndexNotifier: Send + Sync {
    /// A record reached `completed` with its full rendition set.
    async fn media_completed(&self, record: &MediaRecord) -> anyhow::Result<()>;

    /// A record and its objects were removed.
    async fn media_deleted(&self, media_id: Uuid, owner_id: Uuid) -> anyhow::Result<()>;
}

/// No-op notifier that records the event in the log stream.
#[derive(Debug, Default, Clone)]
pub struct LogSearchIndexNotifier;

#[async_trait]
impl SearchIndexNotifier for LogSearchIndexNotifier {
    async fn media_completed(&self, record: &MediaRecord) -> anyhow::Result<()> {
        tracing::debug!(
            media_id = %record.id,
            owner_id = %record.owner_id,
            kind = %record.kind,
            "Search index notified: media completed"
        );
        Ok(())
    }

    async fn media_deleted(&self, media_id: Uuid, owner_id: Uuid) -> anyhow::Result<()> {
        tracing::debug!(
            media_id = %media_id,
            owner_id = %owner_id,
            "Search index notified: media deleted"
        );
        Ok(())
    }
}
