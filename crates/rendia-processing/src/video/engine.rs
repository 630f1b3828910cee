//! Video derivative engine.
//!
//! One probe, one normalized H.264/AAC transcode capped at the configured
//! resolution ceiling, and N evenly spaced still-frame thumbnails. Frame
//! extraction runs concurrently with the transcode; uploads run concurrently
//! once both finish. The middle extracted frame doubles as the record's
//! primary thumbnail under the `thumbnail` version name.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use futures::future::{self, BoxFuture};
use rendia_core::models::{version, Rendition, RenditionPurpose, VersionMap};
use rendia_core::VideoDerivativeConfig;
use rendia_storage::keys;
use rendia_storage::ObjectStorage;
use tempfile::TempDir;
use tokio::process::Command;

use crate::error::ProcessingError;
use crate::video::probe::{self, VideoMetadata, VideoProbe};

/// Evenly spaced capture points: `duration * i / (count + 1)` for
/// `i = 1..=count`, so frames sit strictly inside the clip and never on the
/// first or last frame.
pub fn thumbnail_timestamps(duration: f64, count: usize) -> Vec<f64> {
    if count == 0 || duration <= 0.0 {
        return Vec::new();
    }
    (1..=count)
        .map(|i| duration * i as f64 / (count + 1) as f64)
        .collect()
}

/// Index of the extracted frame that doubles as the primary thumbnail.
pub fn primary_thumbnail_index(count: usize) -> usize {
    count / 2
}

/// Target dimensions when the source exceeds the resolution ceiling; `None`
/// when it already fits. Output dimensions are forced even for yuv420p.
pub fn scaled_dimensions(
    width: u32,
    height: u32,
    max_width: u32,
    max_height: u32,
) -> Option<(u32, u32)> {
    if width <= max_width && height <= max_height {
        return None;
    }
    let ratio = (max_width as f64 / width as f64).min(max_height as f64 / height as f64);
    let w = ((width as f64 * ratio).round() as u32).max(2) & !1;
    let h = ((height as f64 * ratio).round() as u32).max(2) & !1;
    Some((w, h))
}

/// Output of one engine invocation: the rendition set plus the probed source
/// metadata recorded on the media record.
#[derive(Debug, Clone)]
pub struct VideoDerivativeSet {
    pub versions: VersionMap,
    pub metadata: VideoMetadata,
}

pub struct VideoDerivativeEngine {
    storage: Arc<dyn ObjectStorage>,
    config: VideoDerivativeConfig,
    probe: VideoProbe,
}

impl VideoDerivativeEngine {
    pub fn new(
        storage: Arc<dyn ObjectStorage>,
        config: VideoDerivativeConfig,
    ) -> Result<Self, ProcessingError> {
        probe::validate_path(&config.ffmpeg_path)?;
        let probe = VideoProbe::new(config.ffprobe_path.clone())?;
        Ok(Self {
            storage,
            config,
            probe,
        })
    }

    /// Generate and upload the video rendition set from the uploaded
    /// original's bytes. Scratch files live in a per-invocation temp
    /// directory removed on every exit path.
    pub async fn generate(
        &self,
        original_key: &str,
        data: Vec<u8>,
    ) -> Result<VideoDerivativeSet, ProcessingError> {
        let started = Instant::now();
        let source_len = data.len() as u64;

        let workdir = TempDir::new()?;
        let input_path = workdir
            .path()
            .join(format!("source.{}", keys::extension_for(original_key)));
        tokio::fs::write(&input_path, &data).await?;
        drop(data);

        let metadata = self.probe.probe(&input_path).await?;
        if metadata.duration <= 0.0 {
            return Err(ProcessingError::ProbeFailed(
                "Source reports a non-positive duration".to_string(),
            ));
        }

        let scaled = scaled_dimensions(
            metadata.width,
            metadata.height,
            self.config.max_width,
            self.config.max_height,
        );
        let output_path = workdir.path().join("transcoded.mp4");

        let timestamps = thumbnail_timestamps(metadata.duration, self.config.thumbnail_count);
        let frame_paths: Vec<PathBuf> = (0..timestamps.len())
            .map(|i| workdir.path().join(format!("frame_{}.jpg", i)))
            .collect();

        let transcode = self.run_transcode(&input_path, &output_path, scaled);
        let frames = future::try_join_all(
            timestamps
                .iter()
                .zip(frame_paths.iter())
                .map(|(ts, path)| self.extract_frame(&input_path, path, *ts)),
        );
        tokio::try_join!(transcode, frames)?;

        let (out_width, out_height) = scaled.unwrap_or((metadata.width, metadata.height));

        let mut uploads: Vec<BoxFuture<'_, Result<(String, Rendition), ProcessingError>>> =
            Vec::with_capacity(frame_paths.len() + 1);
        uploads.push(Box::pin(self.upload_transcode(
            original_key,
            output_path.clone(),
            out_width,
            out_height,
        )));
        for (i, path) in frame_paths.iter().enumerate() {
            uploads.push(Box::pin(self.upload_frame(original_key, i, path.clone())));
        }
        let results = future::try_join_all(uploads).await?;

        let mut versions: VersionMap = results.into_iter().collect();
        versions.insert(
            version::ORIGINAL.to_string(),
            Rendition {
                storage_key: original_key.to_string(),
                url: Some(self.storage.public_url(original_key)),
                width: Some(metadata.width),
                height: Some(metadata.height),
                byte_size: Some(source_len),
                purpose: RenditionPurpose::Original,
            },
        );
        // The middle frame doubles as the record's primary thumbnail; the
        // alias shares the frame's storage key rather than re-uploading.
        let primary = version::video_thumbnail(primary_thumbnail_index(timestamps.len()));
        if let Some(frame) = versions.get(&primary).cloned() {
            versions.insert(version::THUMBNAIL.to_string(), frame);
        }

        tracing::info!(
            key = %original_key,
            renditions = versions.len(),
            video_duration = metadata.duration,
            duration_ms = started.elapsed().as_millis() as u64,
            "Video rendition set generated"
        );

        Ok(VideoDerivativeSet { versions, metadata })
    }

    #[tracing::instrument(skip(self, input, output), fields(ffmpeg.operation = "transcode"))]
    async fn run_transcode(
        &self,
        input: &Path,
        output: &Path,
        scaled: Option<(u32, u32)>,
    ) -> Result<(), ProcessingError> {
        let video_kbps = self.config.preset.video_bitrate_kbps();
        let audio_kbps = self.config.preset.audio_bitrate_kbps();

        let mut args: Vec<String> = vec![
            "-y".to_string(),
            "-i".to_string(),
            input.to_string_lossy().to_string(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "fast".to_string(),
            "-profile:v".to_string(),
            "main".to_string(),
            "-crf".to_string(),
            self.config.crf.to_string(),
        ];
        if let Some((w, h)) = scaled {
            args.push("-vf".to_string());
            args.push(format!("scale={}:{}", w, h));
        }
        args.extend([
            "-maxrate".to_string(),
            format!("{}k", video_kbps),
            "-bufsize".to_string(),
            format!("{}k", video_kbps * 2),
            "-c:a".to_string(),
            "aac".to_string(),
            "-b:a".to_string(),
            format!("{}k", audio_kbps),
            "-ac".to_string(),
            "2".to_string(),
            "-ar".to_string(),
            "48000".to_string(),
            "-movflags".to_string(),
            "+faststart".to_string(),
            output.to_string_lossy().to_string(),
        ]);

        let result = Command::new(&self.config.ffmpeg_path)
            .args(&args)
            .output()
            .await
            .map_err(|e| ProcessingError::Transcode(format!("Failed to run ffmpeg: {}", e)))?;

        if !result.status.success() {
            return Err(ProcessingError::Transcode(format!(
                "ffmpeg failed: {}",
                String::from_utf8_lossy(&result.stderr)
            )));
        }
        Ok(())
    }

    async fn extract_frame(
        &self,
        input: &Path,
        output: &Path,
        timestamp: f64,
    ) -> Result<(), ProcessingError> {
        let result = Command::new(&self.config.ffmpeg_path)
            .args([
                "-y",
                "-ss",
                &format!("{:.3}", timestamp),
                "-i",
                &input.to_string_lossy(),
                "-frames:v",
                "1",
                "-vf",
                &format!("scale={}:-2", self.config.thumbnail_width),
                "-q:v",
                "2",
                &output.to_string_lossy(),
            ])
            .output()
            .await
            .map_err(|e| {
                ProcessingError::ThumbnailExtraction(format!("Failed to run ffmpeg: {}", e))
            })?;

        if !result.status.success() {
            return Err(ProcessingError::ThumbnailExtraction(format!(
                "ffmpeg failed at {:.3}s: {}",
                timestamp,
                String::from_utf8_lossy(&result.stderr)
            )));
        }
        Ok(())
    }

    async fn upload_transcode(
        &self,
        original_key: &str,
        path: PathBuf,
        width: u32,
        height: u32,
    ) -> Result<(String, Rendition), ProcessingError> {
        let bytes = tokio::fs::read(&path).await?;
        let byte_size = bytes.len() as u64;
        let key = keys::version_key(original_key, version::TRANSCODED, "mp4");
        let url = self.storage.put(&key, bytes, "video/mp4").await?;
        Ok((
            version::TRANSCODED.to_string(),
            Rendition {
                storage_key: key,
                url: Some(url),
                width: Some(width),
                height: Some(height),
                byte_size: Some(byte_size),
                purpose: RenditionPurpose::Transcoded,
            },
        ))
    }

    async fn upload_frame(
        &self,
        original_key: &str,
        index: usize,
        path: PathBuf,
    ) -> Result<(String, Rendition), ProcessingError> {
        let bytes = tokio::fs::read(&path).await?;
        let byte_size = bytes.len() as u64;
        // Decode the extracted frame for its true dimensions; ffmpeg's
        // `scale=W:-2` rounds the height to keep it even.
        let (width, height) = image::load_from_memory(&bytes)
            .map(|img| (img.width(), img.height()))
            .map_err(|e| ProcessingError::ThumbnailExtraction(e.to_string()))?;

        let name = version::video_thumbnail(index);
        let key = keys::version_key(original_key, &name, "jpg");
        let url = self.storage.put(&key, bytes, "image/jpeg").await?;
        Ok((
            name,
            Rendition {
                storage_key: key,
                url: Some(url),
                width: Some(width),
                height: Some(height),
                byte_size: Some(byte_size),
                purpose: RenditionPurpose::Thumbnail,
            },
        ))
    }
}
