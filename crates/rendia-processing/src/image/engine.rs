//! Image derivative engine.
//!
//! One decode feeds five renditions: a capped original (longest edge bounded,
//! source format kept for PNG, JPEG otherwise), a square cover-crop thumbnail,
//! and three fit-inside sizes. Each rendition is derived from the decoded
//! source independently, encoded off the async runtime, and uploaded
//! concurrently. Any branch failing fails the whole invocation; the caller
//! never commits a partial set.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Instant;

use futures::future::{self, BoxFuture};
use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, GenericImageView, ImageFormat};
use rendia_core::models::{version, Rendition, RenditionPurpose, VersionMap};
use rendia_core::ImageDerivativeConfig;
use rendia_storage::keys;
use rendia_storage::ObjectStorage;
use tokio::task;

use crate::error::ProcessingError;
use crate::image::resize;

/// Output of one engine invocation: the full rendition set plus the source
/// dimensions recorded on the media record.
#[derive(Debug, Clone)]
pub struct ImageDerivativeSet {
    pub versions: VersionMap,
    pub source_width: u32,
    pub source_height: u32,
}

pub struct ImageDerivativeEngine {
    storage: Arc<dyn ObjectStorage>,
    config: ImageDerivativeConfig,
}

impl ImageDerivativeEngine {
    pub fn new(storage: Arc<dyn ObjectStorage>, config: ImageDerivativeConfig) -> Self {
        Self { storage, config }
    }

    /// Generate and upload the fixed image rendition set from the uploaded
    /// original's bytes.
    pub async fn generate(
        &self,
        original_key: &str,
        data: Vec<u8>,
    ) -> Result<ImageDerivativeSet, ProcessingError> {
        let started = Instant::now();
        let source_len = data.len() as u64;

        let (img, format) = task::spawn_blocking(move || {
            let format = image::guess_format(&data)
                .map_err(|e| ProcessingError::Decode(e.to_string()))?;
            let img = image::load_from_memory(&data)
                .map_err(|e| ProcessingError::Decode(e.to_string()))?;
            Ok::<_, ProcessingError>((Arc::new(img), format))
        })
        .await??;

        let (source_width, source_height) = img.dimensions();
        tracing::debug!(
            key = %original_key,
            width = source_width,
            height = source_height,
            format = ?format,
            "Decoded image source"
        );

        let mut branches: Vec<BoxFuture<'_, Result<(String, Rendition), ProcessingError>>> =
            Vec::with_capacity(version::IMAGE_SET.len());

        branches.push(self.capped_original_branch(
            original_key,
            Arc::clone(&img),
            format,
            source_len,
        ));

        let fit_sizes = [
            (version::SMALL, self.config.small_size, RenditionPurpose::Small),
            (version::MEDIUM, self.config.medium_size, RenditionPurpose::Medium),
            (version::LARGE, self.config.large_size, RenditionPurpose::Large),
        ];
        for (tag, bound, purpose) in fit_sizes {
            branches.push(self.derived_branch(
                original_key,
                Arc::clone(&img),
                tag,
                purpose,
                move |img| resize::fit_inside(img, bound),
            ));
        }
        let thumb_size = self.config.thumbnail_size;
        branches.push(self.derived_branch(
            original_key,
            Arc::clone(&img),
            version::THUMBNAIL,
            RenditionPurpose::Thumbnail,
            move |img| resize::cover_crop(img, thumb_size),
        ));

        let results = future::try_join_all(branches).await?;
        let versions: VersionMap = results.into_iter().collect();

        tracing::info!(
            key = %original_key,
            renditions = versions.len(),
            duration_ms = started.elapsed().as_millis() as u64,
            "Image rendition set generated"
        );

        Ok(ImageDerivativeSet {
            versions,
            source_width,
            source_height,
        })
    }

    /// The capped original. When the source already fits within the bound it
    /// is left untouched at its key and only described; when it exceeds the
    /// bound the scaled-down re-encode overwrites the object in place, so the
    /// rendition's storage key never changes.
    fn capped_original_branch<'a>(
        &'a self,
        original_key: &'a str,
        img: Arc<DynamicImage>,
        format: ImageFormat,
        source_len: u64,
    ) -> BoxFuture<'a, Result<(String, Rendition), ProcessingError>> {
        let quality = self.config.quality;
        let bound = self.config.original_max;

        Box::pin(async move {
            let (source_width, source_height) = img.dimensions();
            if source_width.max(source_height) <= bound {
                return Ok((
                    version::ORIGINAL.to_string(),
                    Rendition {
                        storage_key: original_key.to_string(),
                        url: Some(self.storage.public_url(original_key)),
                        width: Some(source_width),
                        height: Some(source_height),
                        byte_size: Some(source_len),
                        purpose: RenditionPurpose::Original,
                    },
                ));
            }

            let (bytes, content_type, width, height) = task::spawn_blocking(move || {
                let capped = resize::fit_inside(&img, bound);
                let (width, height) = capped.dimensions();
                // PNG keeps its lossless codec; everything else normalizes
                // to JPEG at the configured quality.
                let (bytes, content_type) = if format == ImageFormat::Png {
                    (encode_png(&capped)?, "image/png")
                } else {
                    (encode_jpeg(&capped, quality)?, "image/jpeg")
                };
                Ok::<_, ProcessingError>((bytes, content_type, width, height))
            })
            .await??;

            let byte_size = bytes.len() as u64;
            let url = self.storage.put(original_key, bytes, content_type).await?;
            Ok((
                version::ORIGINAL.to_string(),
                Rendition {
                    storage_key: original_key.to_string(),
                    url: Some(url),
                    width: Some(width),
                    height: Some(height),
                    byte_size: Some(byte_size),
                    purpose: RenditionPurpose::Original,
                },
            ))
        })
    }

    fn derived_branch<'a, F>(
        &'a self,
        original_key: &'a str,
        img: Arc<DynamicImage>,
        tag: &'static str,
        purpose: RenditionPurpose,
        derive: F,
    ) -> BoxFuture<'a, Result<(String, Rendition), ProcessingError>>
    where
        F: FnOnce(&DynamicImage) -> DynamicImage + Send + 'static,
    {
        let quality = self.config.quality;

        Box::pin(async move {
            let (bytes, width, height) = task::spawn_blocking(move || {
                let derived = derive(&img);
                let (width, height) = derived.dimensions();
                let bytes = encode_jpeg(&derived, quality)?;
                Ok::<_, ProcessingError>((bytes, width, height))
            })
            .await??;

            let key = keys::version_key(original_key, tag, "jpg");
            let byte_size = bytes.len() as u64;
            let url = self.storage.put(&key, bytes, "image/jpeg").await?;
            Ok((
                tag.to_string(),
                Rendition {
                    storage_key: key,
                    url: Some(url),
                    width: Some(width),
                    height: Some(height),
                    byte_size: Some(byte_size),
                    purpose,
                },
            ))
        })
    }
}

/// JPEG-encode at the given quality. Alpha is dropped first; the JPEG
/// encoder rejects RGBA input.
fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, ProcessingError> {
    let rgb = img.to_rgb8();
    let mut buf = Vec::new();
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    rgb.write_with_encoder(encoder)
        .map_err(|e| ProcessingError::Encode(e.to_string()))?;
    Ok(buf)
}

fn encode_png(img: &DynamicImage) -> Result<Vec<u8>, ProcessingError> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| ProcessingError::Encode(e.to_string()))?;
    Ok(buf)
}
