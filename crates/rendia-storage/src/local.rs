use crate::traits::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
use async_trait::async_trait;
use rendia_core::StorageBackend;
use std::path::PathBuf;
use std::time::Duration;
use tokio::fs;

/// Local filesystem storage implementation.
///
/// Used for development and tests. Presigned URLs are plain URLs under
/// `base_url` with no embedded credentials; anything that needs real
/// time-limited write authorization should run against the S3 backend.
#[derive(Clone)]
pub struct LocalObjectStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalObjectStorage {
    /// Create a new LocalObjectStorage instance.
    ///
    /// # Arguments
    /// * `base_path` - Root directory for object storage
    /// * `base_url` - Base URL for serving objects (e.g. "http://localhost:3000/media")
    pub async fn new(base_path: impl Into<PathBuf>, base_url: String) -> StorageResult<Self> {
        let base_path = base_path.into();

        fs::create_dir_all(&base_path).await.map_err(|e| {
            StorageError::ConfigError(format!(
                "Failed to create storage directory {}: {}",
                base_path.display(),
                e
            ))
        })?;

        Ok(LocalObjectStorage {
            base_path,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Convert a storage key to a filesystem path, rejecting keys that could
    /// escape the base directory.
    fn key_to_path(&self, key: &str) -> StorageResult<PathBuf> {
        if key.is_empty() || key.contains("..") || key.starts_with('/') || key.contains('\\') {
            return Err(StorageError::InvalidKey(
                "Storage key contains invalid characters".to_string(),
            ));
        }
        Ok(self.base_path.join(key))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn put(&self, key: &str, data: Vec<u8>, _content_type: &str) -> StorageResult<String> {
        let path = self.key_to_path(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| StorageError::UploadFailed(e.to_string()))?;
        }
        let size = data.len() as u64;
        fs::write(&path, data)
            .await
            .map_err(|e| StorageError::UploadFailed(e.to_string()))?;

        tracing::debug!(key = %key, size_bytes = size, "Local put successful");
        Ok(self.public_url(key))
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        let path = self.key_to_path(key)?;
        match fs::read(&path).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(StorageError::DownloadFailed(e.to_string())),
        }
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectInfo>> {
        let path = self.key_to_path(key)?;
        match fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(Some(ObjectInfo {
                key: key.to_string(),
                size: meta.len(),
            })),
            Ok(_) => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StorageError::BackendError(e.to_string())),
        }
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        let path = self.key_to_path(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            // Idempotent deletion: a missing key is already gone.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::DeleteFailed(e.to_string())),
        }
    }

    async fn list(&self, prefix: &str) -> StorageResult<Vec<String>> {
        let base = self.base_path.clone();
        let prefix = prefix.to_string();
        // Directory walk is synchronous filesystem work; keep it off the
        // async pool.
        let keys = tokio::task::spawn_blocking(move || -> StorageResult<Vec<String>> {
            let mut keys = Vec::new();
            let mut stack = vec![base.clone()];
            while let Some(dir) = stack.pop() {
                let entries = match std::fs::read_dir(&dir) {
                    Ok(entries) => entries,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                    Err(e) => return Err(StorageError::BackendError(e.to_string())),
                };
                for entry in entries {
                    let entry = entry.map_err(|e| StorageError::BackendError(e.to_string()))?;
                    let path = entry.path();
                    if path.is_dir() {
                        stack.push(path);
                    } else if let Ok(rel) = path.strip_prefix(&base) {
                        let key = rel.to_string_lossy().replace('\\', "/");
                        if key.starts_with(&prefix) {
                            keys.push(key);
                        }
                    }
                }
            }
            keys.sort();
            Ok(keys)
        })
        .await
        .map_err(|e| StorageError::BackendError(e.to_string()))??;

        Ok(keys)
    }

    async fn presigned_put_url(
        &self,
        key: &str,
        _content_type: &str,
        _expires_in: Duration,
    ) -> StorageResult<String> {
        // No signing for the filesystem backend; clients of a dev deployment
        // write through the app tier instead.
        self.key_to_path(key)?;
        Ok(self.public_url(key))
    }

    async fn presigned_get_url(&self, key: &str, _expires_in: Duration) -> StorageResult<String> {
        self.key_to_path(key)?;
        Ok(self.public_url(key))
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url, key)
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn storage() -> (tempfile::TempDir, LocalObjectStorage) {
        let dir = tempfile::tempdir().unwrap();
        let storage = LocalObjectStorage::new(dir.path(), "http://localhost:3000/media".into())
            .await
            .unwrap();
        (dir, storage)
    }

    #[tokio::test]
    async fn test_put_head_get_roundtrip() {
        let (_dir, storage) = storage().await;

        let url = storage
            .put("images/a/2026/01/01/x.jpg", b"hello".to_vec(), "image/jpeg")
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:3000/media/images/a/2026/01/01/x.jpg");

        let info = storage.head("images/a/2026/01/01/x.jpg").await.unwrap();
        assert_eq!(info.unwrap().size, 5);

        let data = storage.get("images/a/2026/01/01/x.jpg").await.unwrap();
        assert_eq!(data, b"hello");
    }

    #[tokio::test]
    async fn test_head_missing_is_none() {
        let (_dir, storage) = storage().await;
        assert!(storage.head("images/missing.jpg").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (_dir, storage) = storage().await;
        storage
            .put("videos/v.mp4", b"data".to_vec(), "video/mp4")
            .await
            .unwrap();
        storage.delete("videos/v.mp4").await.unwrap();
        // Second delete of the same key must not error.
        storage.delete("videos/v.mp4").await.unwrap();
        assert!(storage.head("videos/v.mp4").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_by_prefix() {
        let (_dir, storage) = storage().await;
        for key in [
            "images/o/2026/01/01/a.jpg",
            "images/o/2026/01/01/a_thumbnail.jpg",
            "videos/o/2026/01/01/b.mp4",
        ] {
            storage.put(key, b"x".to_vec(), "x").await.unwrap();
        }

        let keys = storage.list("images/o/2026/01/01/a").await.unwrap();
        assert_eq!(
            keys,
            vec![
                "images/o/2026/01/01/a.jpg".to_string(),
                "images/o/2026/01/01/a_thumbnail.jpg".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_traversal_keys_rejected() {
        let (_dir, storage) = storage().await;
        assert!(matches!(
            storage.get("../etc/passwd").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            storage.put("/abs/path", vec![], "x").await,
            Err(StorageError::InvalidKey(_))
        ));
    }
}
