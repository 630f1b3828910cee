//! Shared application state.

use std::sync::Arc;

use rendia_core::Config;
use rendia_db::repository::MediaRecordRepository;
use rendia_processing::MediaIngestService;
use rendia_storage::ObjectStorage;

/// Handler-visible state. The ingest service owns the pipeline; the
/// repository and storage handles are exposed for read paths and health
/// checks.
pub struct AppState {
    pub config: Config,
    pub repository: Arc<dyn MediaRecordRepository>,
    pub storage: Arc<dyn ObjectStorage>,
    pub ingest: Arc<MediaIngestService>,
}
