//! Source inspection via ffprobe.

use std::path::{Path, PathBuf};

use tokio::process::Command;

use crate::error::ProcessingError;

/// Reject paths carrying shell metacharacters or traversal sequences before
/// they reach a subprocess argument list.
pub(crate) fn validate_path(path: &str) -> Result<(), ProcessingError> {
    let dangerous_chars = [';', '|', '&', '$', '`', '(', ')', '<', '>', '\n', '\r'];
    if path.chars().any(|c| dangerous_chars.contains(&c)) {
        return Err(ProcessingError::ProbeFailed(format!(
            "Path contains dangerous characters: {}",
            path
        )));
    }
    if path.contains("..") {
        return Err(ProcessingError::ProbeFailed(format!(
            "Path contains directory traversal: {}",
            path
        )));
    }
    Ok(())
}

pub(crate) fn validate_and_canonicalize_path(path: &Path) -> Result<PathBuf, ProcessingError> {
    validate_path(&path.to_string_lossy())?;

    if path.exists() {
        path.canonicalize().map_err(|e| {
            ProcessingError::ProbeFailed(format!("Failed to canonicalize path: {}", e))
        })
    } else {
        if let Some(parent) = path.parent() {
            parent.canonicalize().map_err(|e| {
                ProcessingError::ProbeFailed(format!("Failed to canonicalize parent path: {}", e))
            })?;
        }
        Ok(path.to_path_buf())
    }
}

/// Source stream facts extracted before transcoding.
#[derive(Debug, Clone, PartialEq)]
pub struct VideoMetadata {
    pub duration: f64,
    pub width: u32,
    pub height: u32,
    pub codec: String,
    pub bitrate: Option<u64>,
    pub framerate: Option<f32>,
}

pub struct VideoProbe {
    ffprobe_path: String,
}

impl VideoProbe {
    pub fn new(ffprobe_path: String) -> Result<Self, ProcessingError> {
        validate_path(&ffprobe_path)?;
        if !ffprobe_path.chars().all(|c| {
            c.is_alphanumeric() || c == '/' || c == '-' || c == '_' || c == '.' || c == '\\'
        }) {
            return Err(ProcessingError::ProbeFailed(format!(
                "Invalid ffprobe path: {}",
                ffprobe_path
            )));
        }
        Ok(Self { ffprobe_path })
    }

    /// Probe a local file. Fails when ffprobe errors, the output is not
    /// parseable, or the container has no video stream.
    #[tracing::instrument(skip(self), fields(ffmpeg.operation = "probe"))]
    pub async fn probe(&self, video_path: &Path) -> Result<VideoMetadata, ProcessingError> {
        let start = std::time::Instant::now();
        let validated_path = validate_and_canonicalize_path(video_path)?;

        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
                "-select_streams",
                "v:0",
            ])
            .arg(&validated_path)
            .output()
            .await
            .map_err(|e| ProcessingError::ProbeFailed(format!("Failed to run ffprobe: {}", e)))?;

        if !output.status.success() {
            return Err(ProcessingError::ProbeFailed(format!(
                "ffprobe failed: {}",
                String::from_utf8_lossy(&output.stderr)
            )));
        }

        let probe_data: serde_json::Value = serde_json::from_slice(&output.stdout)
            .map_err(|e| ProcessingError::ProbeFailed(format!("Unparseable output: {}", e)))?;

        let stream = probe_data["streams"]
            .get(0)
            .ok_or_else(|| ProcessingError::ProbeFailed("No video stream found".to_string()))?;
        let format = &probe_data["format"];

        let duration = format["duration"]
            .as_str()
            .and_then(|d| d.parse::<f64>().ok())
            .ok_or_else(|| ProcessingError::ProbeFailed("Could not parse duration".to_string()))?;
        let width = stream["width"]
            .as_u64()
            .ok_or_else(|| ProcessingError::ProbeFailed("Could not parse width".to_string()))?
            as u32;
        let height = stream["height"]
            .as_u64()
            .ok_or_else(|| ProcessingError::ProbeFailed("Could not parse height".to_string()))?
            as u32;
        let codec = stream["codec_name"]
            .as_str()
            .unwrap_or("unknown")
            .to_string();
        let bitrate = format["bit_rate"]
            .as_str()
            .and_then(|b| b.parse::<u64>().ok());
        let framerate = stream["r_frame_rate"].as_str().and_then(|r| {
            let parts: Vec<&str> = r.split('/').collect();
            if parts.len() == 2 {
                let num: f32 = parts[0].parse().ok()?;
                let den: f32 = parts[1].parse().ok()?;
                if den != 0.0 {
                    Some(num / den)
                } else {
                    None
                }
            } else {
                None
            }
        });

        tracing::info!(
            duration_ms = start.elapsed().as_millis() as u64,
            video_duration = duration,
            width = width,
            height = height,
            codec = %codec,
            "Video probe completed"
        );

        Ok(VideoMetadata {
            duration,
            width,
            height,
            codec,
            bitrate,
            framerate,
        })
    }
}
