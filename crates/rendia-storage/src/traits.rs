//! Storage abstraction trait.

use async_trait::async_trait;
use rendia_core::AppError;
use rendia_core::StorageBackend;
use std::time::Duration;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl From<StorageError> for AppError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(key) => AppError::NotFound(format!("Object not found: {}", key)),
            other => AppError::Storage(other.to_string()),
        }
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Metadata returned by a head check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectInfo {
    pub key: String,
    pub size: u64,
}

/// Uniform interface over the object store. No business logic lives here.
///
/// All operations are idempotent except `put`, which overwrites. `delete` of
/// a nonexistent key is not an error.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Write an object and return its retrieval URL.
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String>;

    /// Read an object's bytes.
    async fn get(&self, key: &str) -> StorageResult<Vec<u8>>;

    /// Existence + metadata check; `None` means the key does not resolve.
    async fn head(&self, key: &str) -> StorageResult<Option<ObjectInfo>>;

    /// Remove an object. Deleting a missing key succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// List keys under a prefix.
    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>>;

    /// Time-limited URL authorizing one direct PUT against the store.
    async fn presigned_put_url(
        &self,
        key: &str,
        content_type: &str,
        expires_in: Duration,
    ) -> StorageResult<String>;

    /// Time-limited URL authorizing direct GET access.
    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String>;

    /// Public retrieval URL derived from the key.
    fn public_url(&self, key: &str) -> String;

    /// Which backend this is.
    fn backend_type(&self) -> StorageBackend;
}
