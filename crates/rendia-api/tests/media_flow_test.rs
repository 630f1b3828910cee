//! End-to-end HTTP flow against an in-memory repository and a tempdir
//! object store: intake, direct upload, confirmation, background
//! processing, read paths, and deletion.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use rendia_api::setup::build_router;
use rendia_api::state::AppState;
use rendia_core::{
    Config, ImageDerivativeConfig, StorageBackend, StorageConfig, VideoDerivativeConfig,
};
use rendia_db::memory::InMemoryMediaRecordRepository;
use rendia_db::repository::MediaRecordRepository;
use rendia_processing::{LogSearchIndexNotifier, MediaIngestService};
use rendia_storage::traits::{ObjectInfo, StorageResult};
use rendia_storage::{LocalObjectStorage, ObjectStorage, StorageError};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;
use uuid::Uuid;

fn test_config() -> Config {
    Config {
        server_port: 0,
        cors_origins: Vec::new(),
        environment: "test".to_string(),
        database_url: None,
        presign_ttl_secs: 900,
        storage: StorageConfig {
            backend: StorageBackend::Local,
            s3_bucket: None,
            s3_region: None,
            s3_endpoint: None,
            local_path: None,
            local_base_url: None,
        },
        image: ImageDerivativeConfig {
            original_max: 64,
            thumbnail_size: 8,
            small_size: 16,
            medium_size: 24,
            large_size: 32,
            quality: 90,
        },
        video: VideoDerivativeConfig::default(),
    }
}

struct TestApp {
    router: Router,
    state: Arc<AppState>,
    _dir: TempDir,
}

async fn test_app() -> TestApp {
    let dir = TempDir::new().unwrap();
    let storage: Arc<dyn ObjectStorage> = Arc::new(
        LocalObjectStorage::new(dir.path(), "http://localhost:3000/files".to_string())
            .await
            .unwrap(),
    );
    app_over_storage(storage, dir)
}

fn app_over_storage(storage: Arc<dyn ObjectStorage>, dir: TempDir) -> TestApp {
    let repository: Arc<dyn MediaRecordRepository> = Arc::new(InMemoryMediaRecordRepository::new());
    let config = test_config();

    let ingest = Arc::new(
        MediaIngestService::new(
            Arc::clone(&repository),
            Arc::clone(&storage),
            Arc::new(LogSearchIndexNotifier),
            config.image.clone(),
            config.video.clone(),
            Duration::from_secs(config.presign_ttl_secs),
        )
        .unwrap(),
    );

    let state = Arc::new(AppState {
        config,
        repository,
        storage,
        ingest,
    });
    let router = build_router(Arc::clone(&state)).unwrap();
    TestApp {
        router,
        state,
        _dir: dir,
    }
}

async fn send(
    app: &TestApp,
    method: Method,
    uri: &str,
    owner: Option<Uuid>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(owner) = owner {
        builder = builder.header("x-owner-id", owner.to_string());
    }
    let request = match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, value)
}

/// Storage wrapper whose `delete` fails for keys containing a marker.
struct FaultyDeleteStorage {
    inner: Arc<dyn ObjectStorage>,
    marker: String,
}

#[async_trait]
impl ObjectStorage for FaultyDeleteStorage {
    async fn put(&self, key: &str, data: Vec<u8>, content_type: &str) -> StorageResult<String> {
        self.inner.put(key, data, content_type).await
    }

    async fn get(&self, key: &str) -> StorageResult<Vec<u8>> {
        self.inner.get(key).await
    }

    async fn head(&self, key: &str) -> StorageResult<Option<ObjectInfo>> {
        self.inner.head(key).await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        if key.contains(&self.marker) {
            return Err(StorageError::DeleteFailed(format!(
                "injected failure for {}",
                key
            )));
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

    async fn presigned_get_url(&self, key: &str, expires_in: Duration) -> StorageResult<String> {
        self.inner.presigned_get_url(key, expires_in).await
    }

    fn public_url(&self, key: &str) -> String {
        self.inner.public_url(key)
    }

    fn backend_type(&self) -> StorageBackend {
        self.inner.backend_type()
    }
}

fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = DynamicImage::ImageRgba8(RgbaImage::from_pixel(
        width,
        height,
        Rgba([90, 120, 200, 255]),
    ));
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png).unwrap();
    buf
}

async fn wait_for_status(app: &TestApp, owner: Uuid, media_id: &str, wanted: &str) -> Value {
    for _ in 0..200 {
        let (status, body) = send(
            app,
            Method::GET,
            &format!("/api/v1/media/{}", media_id),
            Some(owner),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let current = body["status"].as_str().unwrap().to_string();
        if current == wanted {
            return body;
        }
        assert_ne!(current, "failed", "record failed: {}", body["errorReason"]);
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("record never reached status {}", wanted);
}

#[tokio::test]
async fn test_health() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn test_full_image_lifecycle() {
    let app = test_app().await;
    let owner = Uuid::new_v4();

    // Intake.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/media/presigned-upload-url",
        Some(owner),
        Some(json!({"filename": "photo.png", "mimeType": "image/png"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["presignedUrl"].as_str().is_some());
    let key = body["key"].as_str().unwrap().to_string();
    let media_id = body["mediaId"].as_str().unwrap().to_string();
    assert!(key.starts_with(&format!("images/{}/", owner)));

    // Record is pending and carries no URL for the original yet.
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/media/{}", media_id),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "pending");
    assert!(body["versions"]["original"]["url"].is_null());

    // Simulate the client's direct upload against the store.
    app.state
        .storage
        .put(&key, png_bytes(128, 96), "image/png")
        .await
        .unwrap();

    // Confirm; processing is detached.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/media/confirm-upload",
        Some(owner),
        Some(json!({"mediaId": media_id})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "processing");

    // Wait out the background work.
    let body = wait_for_status(&app, owner, &media_id, "completed").await;
    let versions = body["versions"].as_object().unwrap();
    assert_eq!(versions.len(), 5);
    for name in ["original", "thumbnail", "small", "medium", "large"] {
        assert!(versions.contains_key(name), "missing {}", name);
        assert!(versions[name]["url"].as_str().is_some());
    }
    assert_eq!(body["originalWidth"], 128);
    assert_eq!(body["originalHeight"], 96);

    // List view excludes versions.
    let (status, body) = send(&app, Method::GET, "/api/v1/media", Some(owner), None).await;
    assert_eq!(status, StatusCode::OK);
    let list = body.as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert!(list[0].get("versions").is_none());

    // Delete: every referenced object goes, then the record.
    let keys: Vec<String> = versions
        .values()
        .map(|v| v["storageKey"].as_str().unwrap().to_string())
        .collect();
    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/media/{}", media_id),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"].as_str().unwrap(), media_id);
    assert!(body.get("failed").is_none());

    for key in keys {
        assert!(app.state.storage.head(&key).await.unwrap().is_none());
    }
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/media/{}", media_id),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_unsupported_mime_type_is_rejected() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/media/presigned-upload-url",
        Some(Uuid::new_v4()),
        Some(json!({"filename": "doc.pdf", "mimeType": "application/pdf"})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "UNSUPPORTED_MEDIA_TYPE");
}

#[tokio::test]
async fn test_missing_owner_header_is_unauthorized() {
    let app = test_app().await;
    let (status, body) = send(&app, Method::GET, "/api/v1/media", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHORIZED");
}

#[tokio::test]
async fn test_confirm_unknown_media_is_not_found() {
    let app = test_app().await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/media/confirm-upload",
        Some(Uuid::new_v4()),
        Some(json!({"mediaId": Uuid::new_v4()})),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_confirm_without_upload_fails_the_record() {
    let app = test_app().await;
    let owner = Uuid::new_v4();

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/v1/media/presigned-upload-url",
        Some(owner),
        Some(json!({"filename": "photo.jpg", "mimeType": "image/jpeg"})),
    )
    .await;
    let media_id = body["mediaId"].as_str().unwrap().to_string();

    // No object was uploaded: confirmation fails and the record is terminal.
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/v1/media/confirm-upload",
        Some(owner),
        Some(json!({"mediaId": media_id})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "BAD_REQUEST");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/v1/media/{}", media_id),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "failed");
    assert!(body["errorReason"].as_str().is_some());
}

#[tokio::test]
async fn test_delete_reports_per_key_failures() {
    let dir = TempDir::new().unwrap();
    let local: Arc<dyn ObjectStorage> = Arc::new(
        LocalObjectStorage::new(dir.path(), "http://localhost:3000/files".to_string())
            .await
            .unwrap(),
    );
    let storage: Arc<dyn ObjectStorage> = Arc::new(FaultyDeleteStorage {
        inner: local,
        marker: "_medium".to_string(),
    });
    let app = app_over_storage(storage, dir);
    let owner = Uuid::new_v4();

    let (_, body) = send(
        &app,
        Method::POST,
        "/api/v1/media/presigned-upload-url",
        Some(owner),
        Some(json!({"filename": "photo.png", "mimeType": "image/png"})),
    )
    .await;
    let key = body["key"].as_str().unwrap().to_string();
    let media_id = body["mediaId"].as_str().unwrap().to_string();

    app.state
        .storage
        .put(&key, png_bytes(128, 96), "image/png")
        .await
        .unwrap();
    send(
        &app,
        Method::POST,
        "/api/v1/media/confirm-upload",
        Some(owner),
        Some(json!({"mediaId": media_id})),
    )
    .await;
    wait_for_status(&app, owner, &media_id, "completed").await;

    // One object refuses to go; the response reports it and the record is
    // removed anyway.
    let (status, body) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/media/{}", media_id),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let failed = body["failed"].as_array().unwrap();
    assert_eq!(failed.len(), 1);
    assert!(failed[0]["key"].as_str().unwrap().contains("_medium"));
    assert!(failed[0]["error"].as_str().is_some());
    assert_eq!(body["deleted"].as_array().unwrap().len(), 4);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/media/{}", media_id),
        Some(owner),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_foreign_owner_sees_nothing() {
    let app = test_app().await;
    let owner = Uuid::new_v4();
    let (_, body) = send(
        &app,
        Method::POST,
        "/api/v1/media/presigned-upload-url",
        Some(owner),
        Some(json!({"filename": "photo.png", "mimeType": "image/png"})),
    )
    .await;
    let media_id = body["mediaId"].as_str().unwrap().to_string();

    let stranger = Uuid::new_v4();
    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/v1/media/{}", media_id),
        Some(stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        Method::DELETE,
        &format!("/api/v1/media/{}", media_id),
        Some(stranger),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, list) = send(&app, Method::GET, "/api/v1/media", Some(stranger), None).await;
    assert_eq!(list.as_array().unwrap().len(), 0);
}
