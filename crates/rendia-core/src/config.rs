//! Configuration module.
//!
//! `Config::from_env()` loads the service configuration from the environment
//! (a `.env` file is honored in development). The per-engine derivative
//! configs are explicit structs injected into the engines rather than read
//! from ambient globals, so tests can vary thresholds deterministically.

use std::env;
use std::str::FromStr;

use anyhow::{anyhow, Context};

// Derivative defaults
const DEFAULT_ORIGINAL_MAX: u32 = 4000;
const DEFAULT_THUMBNAIL_SIZE: u32 = 300;
const DEFAULT_SMALL_SIZE: u32 = 800;
const DEFAULT_MEDIUM_SIZE: u32 = 1200;
const DEFAULT_LARGE_SIZE: u32 = 2000;
const DEFAULT_JPEG_QUALITY: u8 = 90;
const DEFAULT_VIDEO_MAX_WIDTH: u32 = 1920;
const DEFAULT_VIDEO_MAX_HEIGHT: u32 = 1080;
const DEFAULT_VIDEO_CRF: u8 = 22;
const DEFAULT_VIDEO_THUMBNAIL_COUNT: usize = 3;
const DEFAULT_PRESIGN_TTL_SECS: u64 = 15 * 60;
const DEFAULT_SERVER_PORT: u16 = 3000;

/// Storage backend selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageBackend {
    S3,
    Local,
}

impl FromStr for StorageBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "s3" => Ok(StorageBackend::S3),
            "local" => Ok(StorageBackend::Local),
            other => Err(anyhow!("Unknown storage backend: {}", other)),
        }
    }
}

/// Object store configuration.
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    pub s3_bucket: Option<String>,
    pub s3_region: Option<String>,
    /// Custom endpoint for S3-compatible providers (MinIO, Spaces, ...).
    pub s3_endpoint: Option<String>,
    pub local_path: Option<String>,
    pub local_base_url: Option<String>,
}

/// Numeric policy for the image derivative engine.
#[derive(Debug, Clone)]
pub struct ImageDerivativeConfig {
    /// Longest edge allowed for the stored "original"; larger sources are
    /// scaled down, never cropped.
    pub original_max: u32,
    /// Square cover-crop edge for the thumbnail rendition.
    pub thumbnail_size: u32,
    /// Fit-inside bounds (longer edge) for small/medium/large.
    pub small_size: u32,
    pub medium_size: u32,
    pub large_size: u32,
    /// JPEG quality for lossy renditions.
    pub quality: u8,
}

impl Default for ImageDerivativeConfig {
    fn default() -> Self {
        ImageDerivativeConfig {
            original_max: DEFAULT_ORIGINAL_MAX,
            thumbnail_size: DEFAULT_THUMBNAIL_SIZE,
            small_size: DEFAULT_SMALL_SIZE,
            medium_size: DEFAULT_MEDIUM_SIZE,
            large_size: DEFAULT_LARGE_SIZE,
            quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

/// Audio/video bitrate tier for the normalized transcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VideoQualityPreset {
    Low,
    Medium,
    High,
}

impl VideoQualityPreset {
    /// Video bitrate cap in kbps (applied as ffmpeg maxrate alongside CRF).
    pub fn video_bitrate_kbps(&self) -> u32 {
        match self {
            VideoQualityPreset::Low => 1000,
            VideoQualityPreset::Medium => 2500,
            VideoQualityPreset::High => 5000,
        }
    }

    pub fn audio_bitrate_kbps(&self) -> u32 {
        match self {
            VideoQualityPreset::Low => 96,
            VideoQualityPreset::Medium => 128,
            VideoQualityPreset::High => 192,
        }
    }
}

impl FromStr for VideoQualityPreset {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(VideoQualityPreset::Low),
            "medium" => Ok(VideoQualityPreset::Medium),
            "high" => Ok(VideoQualityPreset::High),
            other => Err(anyhow!("Unknown video quality preset: {}", other)),
        }
    }
}

/// Numeric policy for the video derivative engine.
#[derive(Debug, Clone)]
pub struct VideoDerivativeConfig {
    /// Resolution ceiling; sources above it are scaled down preserving
    /// aspect ratio, never upscaled.
    pub max_width: u32,
    pub max_height: u32,
    /// x264 constant rate factor for the normalized transcode.
    pub crf: u8,
    pub preset: VideoQualityPreset,
    /// Number of evenly spaced still-frame thumbnails to extract.
    pub thumbnail_count: usize,
    /// Thumbnail width in pixels; height follows the aspect ratio.
    pub thumbnail_width: u32,
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for VideoDerivativeConfig {
    fn default() -> Self {
        VideoDerivativeConfig {
            max_width: DEFAULT_VIDEO_MAX_WIDTH,
            max_height: DEFAULT_VIDEO_MAX_HEIGHT,
            crf: DEFAULT_VIDEO_CRF,
            preset: VideoQualityPreset::High,
            thumbnail_count: DEFAULT_VIDEO_THUMBNAIL_COUNT,
            thumbnail_width: DEFAULT_THUMBNAIL_SIZE,
            ffmpeg_path: "ffmpeg".to_string(),
            ffprobe_path: "ffprobe".to_string(),
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub server_port: u16,
    pub cors_origins: Vec<String>,
    pub environment: String,
    /// Absent means the in-memory record store (dev/test only).
    pub database_url: Option<String>,
    /// TTL for presigned upload URLs.
    pub presign_ttl_secs: u64,
    pub storage: StorageConfig,
    pub image: ImageDerivativeConfig,
    pub video: VideoDerivativeConfig,
}

fn env_or<T: FromStr>(key: &str, default: T) -> anyhow::Result<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| anyhow!("Invalid {}: {}", key, e)),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        // Best-effort .env for development; missing file is fine.
        dotenvy::dotenv().ok();

        let backend: StorageBackend = env_or("STORAGE_BACKEND", StorageBackend::Local)?;
        let storage = StorageConfig {
            backend,
            s3_bucket: env::var("S3_BUCKET").ok(),
            s3_region: env::var("S3_REGION").ok(),
            s3_endpoint: env::var("S3_ENDPOINT").ok(),
            local_path: env::var("LOCAL_STORAGE_PATH").ok(),
            local_base_url: env::var("LOCAL_STORAGE_BASE_URL").ok(),
        };

        if backend == StorageBackend::S3 {
            storage
                .s3_bucket
                .as_ref()
                .context("S3_BUCKET is required when STORAGE_BACKEND=s3")?;
            storage
                .s3_region
                .as_ref()
                .context("S3_REGION is required when STORAGE_BACKEND=s3")?;
        }

        let image = ImageDerivativeConfig {
            original_max: env_or("IMAGE_ORIGINAL_MAX", DEFAULT_ORIGINAL_MAX)?,
            thumbnail_size: env_or("IMAGE_THUMBNAIL_SIZE", DEFAULT_THUMBNAIL_SIZE)?,
            small_size: env_or("IMAGE_SMALL_SIZE", DEFAULT_SMALL_SIZE)?,
            medium_size: env_or("IMAGE_MEDIUM_SIZE", DEFAULT_MEDIUM_SIZE)?,
            large_size: env_or("IMAGE_LARGE_SIZE", DEFAULT_LARGE_SIZE)?,
            quality: env_or("IMAGE_QUALITY", DEFAULT_JPEG_QUALITY)?,
        };

        let video = VideoDerivativeConfig {
            max_width: env_or("VIDEO_MAX_WIDTH", DEFAULT_VIDEO_MAX_WIDTH)?,
            max_height: env_or("VIDEO_MAX_HEIGHT", DEFAULT_VIDEO_MAX_HEIGHT)?,
            crf: env_or("VIDEO_CRF", DEFAULT_VIDEO_CRF)?,
            preset: env_or("VIDEO_QUALITY_PRESET", VideoQualityPreset::High)?,
            thumbnail_count: env_or("VIDEO_THUMBNAIL_COUNT", DEFAULT_VIDEO_THUMBNAIL_COUNT)?,
            thumbnail_width: env_or("VIDEO_THUMBNAIL_WIDTH", DEFAULT_THUMBNAIL_SIZE)?,
            ffmpeg_path: env::var("FFMPEG_PATH").unwrap_or_else(|_| "ffmpeg".to_string()),
            ffprobe_path: env::var("FFPROBE_PATH").unwrap_or_else(|_| "ffprobe".to_string()),
        };

        Ok(Config {
            server_port: env_or("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            cors_origins: env::var("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_default(),
            environment: env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string()),
            database_url: env::var("DATABASE_URL").ok(),
            presign_ttl_secs: env_or("PRESIGN_TTL_SECS", DEFAULT_PRESIGN_TTL_SECS)?,
            storage,
            image,
            video,
        })
    }

    pub fn is_production(&self) -> bool {
        matches!(self.environment.to_lowercase().as_str(), "production" | "prod")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_defaults_match_policy() {
        let cfg = ImageDerivativeConfig::default();
        assert_eq!(cfg.original_max, 4000);
        assert_eq!(cfg.thumbnail_size, 300);
        assert_eq!(cfg.small_size, 800);
        assert_eq!(cfg.medium_size, 1200);
        assert_eq!(cfg.large_size, 2000);
        assert_eq!(cfg.quality, 90);
    }

    #[test]
    fn test_video_defaults_match_policy() {
        let cfg = VideoDerivativeConfig::default();
        assert_eq!(cfg.max_width, 1920);
        assert_eq!(cfg.max_height, 1080);
        assert_eq!(cfg.crf, 22);
        assert_eq!(cfg.thumbnail_count, 3);
        assert_eq!(cfg.preset, VideoQualityPreset::High);
        assert_eq!(cfg.preset.audio_bitrate_kbps(), 192);
    }

    #[test]
    fn test_preset_parsing() {
        assert_eq!(
            "medium".parse::<VideoQualityPreset>().unwrap(),
            VideoQualityPreset::Medium
        );
        assert!("ultra".parse::<VideoQualityPreset>().is_err());
    }
}
