//! Storage key generation.
//!
//! Originals are partitioned by kind, owner, and upload date:
//! `{images|videos}/{owner_id}/{yyyy}/{mm}/{dd}/{uuid}.{ext}`. Derived
//! renditions reuse the original's key with a version tag suffixed before
//! the extension, so one record's objects group together under a common
//! prefix.

use chrono::{DateTime, Datelike, Utc};
use rendia_core::models::MediaKind;
use uuid::Uuid;

/// Lowercased file extension from a declared filename; `bin` when absent.
pub fn extension_for(filename: &str) -> String {
    std::path::Path::new(filename)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

/// Allocate the original object's key for a new ingestion.
pub fn original_key(
    kind: MediaKind,
    owner_id: Uuid,
    uploaded_at: DateTime<Utc>,
    media_id: Uuid,
    filename: &str,
) -> String {
    format!(
        "{}/{}/{:04}/{:02}/{:02}/{}.{}",
        kind.key_prefix(),
        owner_id,
        uploaded_at.year(),
        uploaded_at.month(),
        uploaded_at.day(),
        media_id,
        extension_for(filename)
    )
}

/// Derive a rendition key from the original's key: the version tag is
/// suffixed before the extension, and the extension is replaced by the
/// rendition's encoded format.
pub fn version_key(original_key: &str, tag: &str, ext: &str) -> String {
    let stem = match original_key.rfind('.') {
        // Guard against a dot that belongs to a path segment, not the filename.
        Some(idx) if idx > original_key.rfind('/').map_or(0, |s| s + 1) => &original_key[..idx],
        _ => original_key,
    };
    format!("{}_{}.{}", stem, tag, ext)
}

/// Common prefix of every object belonging to one original key.
pub fn record_prefix(original_key: &str) -> String {
    match original_key.rfind('.') {
        Some(idx) if idx > original_key.rfind('/').map_or(0, |s| s + 1) => {
            original_key[..idx].to_string()
        }
        _ => original_key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_original_key_partitioning() {
        let owner = Uuid::parse_str("7f1a2b3c-0000-0000-0000-000000000001").unwrap();
        let id = Uuid::parse_str("7f1a2b3c-0000-0000-0000-000000000002").unwrap();
        let at = Utc.with_ymd_and_hms(2026, 3, 7, 12, 0, 0).unwrap();

        let key = original_key(MediaKind::Image, owner, at, id, "My Photo.JPG");
        assert_eq!(
            key,
            format!("images/{}/2026/03/07/{}.jpg", owner, id)
        );

        let key = original_key(MediaKind::Video, owner, at, id, "clip.mp4");
        assert!(key.starts_with("videos/"));
    }

    #[test]
    fn test_version_key_suffixes_tag() {
        assert_eq!(
            version_key("images/o/2026/03/07/abc.png", "thumbnail", "jpg"),
            "images/o/2026/03/07/abc_thumbnail.jpg"
        );
        // No extension on the original: tag still appended.
        assert_eq!(
            version_key("images/o/2026/03/07/abc", "small", "jpg"),
            "images/o/2026/03/07/abc_small.jpg"
        );
    }

    #[test]
    fn test_version_key_ignores_dots_in_path_segments() {
        assert_eq!(
            version_key("images/v1.2/abc", "large", "jpg"),
            "images/v1.2/abc_large.jpg"
        );
    }

    #[test]
    fn test_extension_fallback() {
        assert_eq!(extension_for("noext"), "bin");
        assert_eq!(extension_for("a.TAR.GZ"), "gz");
    }
}
