//! Service construction from configuration.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use rendia_core::{Config, StorageBackend};
use rendia_db::memory::InMemoryMediaRecordRepository;
use rendia_db::postgres::PostgresMediaRecordRepository;
use rendia_db::repository::MediaRecordRepository;
use rendia_processing::{LogSearchIndexNotifier, MediaIngestService};
use rendia_storage::{LocalObjectStorage, ObjectStorage, S3ObjectStorage};
use sqlx::postgres::PgPoolOptions;

use crate::state::AppState;

async fn build_storage(config: &Config) -> anyhow::Result<Arc<dyn ObjectStorage>> {
    match config.storage.backend {
        StorageBackend::S3 => {
            let bucket = config
                .storage
                .s3_bucket
                .clone()
                .context("S3_BUCKET is required for the s3 backend")?;
            let region = config
                .storage
                .s3_region
                .clone()
                .context("S3_REGION is required for the s3 backend")?;
            let storage =
                S3ObjectStorage::new(bucket, region, config.storage.s3_endpoint.clone()).await?;
            Ok(Arc::new(storage))
        }
        StorageBackend::Local => {
            let base_path = config
                .storage
                .local_path
                .clone()
                .unwrap_or_else(|| "./media-storage".to_string());
            let base_url = config
                .storage
                .local_base_url
                .clone()
                .unwrap_or_else(|| format!("http://localhost:{}/files", config.server_port));
            let storage = LocalObjectStorage::new(base_path, base_url).await?;
            Ok(Arc::new(storage))
        }
    }
}

async fn build_repository(config: &Config) -> anyhow::Result<Arc<dyn MediaRecordRepository>> {
    match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await
                .context("Failed to connect to the database")?;
            PostgresMediaRecordRepository::run_migrations(&pool).await?;
            Ok(Arc::new(PostgresMediaRecordRepository::new(pool)))
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using the in-memory record store");
            Ok(Arc::new(InMemoryMediaRecordRepository::new()))
        }
    }
}

/// Build the shared application state from configuration.
pub async fn build_state(config: Config) -> anyhow::Result<Arc<AppState>> {
    let storage = build_storage(&config).await?;
    let repository = build_repository(&config).await?;

    let ingest = Arc::new(MediaIngestService::new(
        Arc::clone(&repository),
        Arc::clone(&storage),
        Arc::new(LogSearchIndexNotifier),
        config.image.clone(),
        config.video.clone(),
        Duration::from_secs(config.presign_ttl_secs),
    )?);

    Ok(Arc::new(AppState {
        config,
        repository,
        storage,
        ingest,
    }))
}
