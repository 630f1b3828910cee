//! Media record and rendition model.
//!
//! A `MediaRecord` tracks one ingestion unit from intake (`pending`) through
//! background derivative generation (`processing`) to a terminal state
//! (`completed` or `failed`). The `versions` map holds one `Rendition` per
//! derived artifact and is either fully populated for the record's kind or
//! empty; partial sets must never be visible as `completed`.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Media kind, derived from the declared content type at intake; immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    Image,
    Video,
}

impl MediaKind {
    /// Map a declared content type to a kind. Anything that is not an
    /// `image/*` or `video/*` type is unsupported.
    pub fn from_content_type(content_type: &str) -> Option<MediaKind> {
        let ct = content_type.trim().to_ascii_lowercase();
        if ct.starts_with("image/") {
            Some(MediaKind::Image)
        } else if ct.starts_with("video/") {
            Some(MediaKind::Video)
        } else {
            None
        }
    }

    /// Storage key prefix partition for this kind.
    pub fn key_prefix(&self) -> &'static str {
        match self {
            MediaKind::Image => "images",
            MediaKind::Video => "videos",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MediaKind::Image => write!(f, "image"),
            MediaKind::Video => write!(f, "video"),
        }
    }
}

impl FromStr for MediaKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaKind::Image),
            "video" => Ok(MediaKind::Video),
            other => Err(format!("Unknown media kind: {}", other)),
        }
    }
}

/// Lifecycle status. Transitions are monotonic:
/// pending → processing → {completed, failed}. A record traverses the path
/// at most once; re-processing a terminal record is never permitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum MediaStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl MediaStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, MediaStatus::Completed | MediaStatus::Failed)
    }

    /// Whether a transition to `next` is permitted by the state machine.
    pub fn can_transition_to(&self, next: MediaStatus) -> bool {
        matches!(
            (self, next),
            (MediaStatus::Pending, MediaStatus::Processing)
                | (MediaStatus::Pending, MediaStatus::Failed)
                | (MediaStatus::Processing, MediaStatus::Completed)
                | (MediaStatus::Processing, MediaStatus::Failed)
        )
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MediaStatus::Pending => "pending",
            MediaStatus::Processing => "processing",
            MediaStatus::Completed => "completed",
            MediaStatus::Failed => "failed",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for MediaStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(MediaStatus::Pending),
            "processing" => Ok(MediaStatus::Processing),
            "completed" => Ok(MediaStatus::Completed),
            "failed" => Ok(MediaStatus::Failed),
            other => Err(format!("Unknown media status: {}", other)),
        }
    }
}

/// What a rendition is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RenditionPurpose {
    Original,
    Thumbnail,
    Small,
    Medium,
    Large,
    Transcoded,
}

/// Version-name constants for the `versions` map.
pub mod version {
    pub const ORIGINAL: &str = "original";
    pub const THUMBNAIL: &str = "thumbnail";
    pub const SMALL: &str = "small";
    pub const MEDIUM: &str = "medium";
    pub const LARGE: &str = "large";
    pub const TRANSCODED: &str = "transcoded";

    /// Ordered extracted video thumbnail entries: `thumbnail_0`, `thumbnail_1`, ...
    pub fn video_thumbnail(index: usize) -> String {
        format!("thumbnail_{}", index)
    }

    /// The fixed rendition set for a completed image record.
    pub const IMAGE_SET: [&str; 5] = [ORIGINAL, THUMBNAIL, SMALL, MEDIUM, LARGE];
}

/// One derived (or original) artifact with its own storage location.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct Rendition {
    /// Opaque location in the object store; immutable once set.
    pub storage_key: String,
    /// Retrieval URL derived from the storage key. Absent until an object
    /// actually exists at the key (e.g. the original at intake time).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub byte_size: Option<u64>,
    pub purpose: RenditionPurpose,
}

impl Rendition {
    /// A placeholder for the original at intake time: key allocated, nothing
    /// uploaded yet, so no URL and no dimensions.
    pub fn pending_original(storage_key: String) -> Self {
        Rendition {
            storage_key,
            url: None,
            width: None,
            height: None,
            byte_size: None,
            purpose: RenditionPurpose::Original,
        }
    }
}

/// Mapping from version name to rendition. BTreeMap keeps serialization
/// deterministic for the JSONB column and test assertions.
pub type VersionMap = BTreeMap<String, Rendition>;

/// One ingestion unit.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecord {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub kind: MediaKind,
    pub declared_content_type: String,
    pub original_filename: String,
    pub status: MediaStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    pub versions: VersionMap,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub original_height: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_seconds: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub codec: Option<String>,
    /// Opaque association supplied by the conversation collaborator; never
    /// validated here.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MediaRecord {
    /// Create the initial pending record at intake, with the original's
    /// storage key allocated but nothing uploaded yet.
    #[allow(clippy::too_many_arguments)]
    pub fn new_pending(
        id: Uuid,
        owner_id: Uuid,
        kind: MediaKind,
        declared_content_type: String,
        original_filename: String,
        original_key: String,
        conversation_id: Option<String>,
        message_id: Option<String>,
    ) -> Self {
        let now = Utc::now();
        let mut versions = VersionMap::new();
        versions.insert(
            version::ORIGINAL.to_string(),
            Rendition::pending_original(original_key),
        );
        MediaRecord {
            id,
            owner_id,
            kind,
            declared_content_type,
            original_filename,
            status: MediaStatus::Pending,
            error_reason: None,
            versions,
            original_width: None,
            original_height: None,
            duration_seconds: None,
            bitrate: None,
            codec: None,
            conversation_id,
            message_id,
            created_at: now,
            updated_at: now,
        }
    }

    /// The original object's storage key, if allocated.
    pub fn original_key(&self) -> Option<&str> {
        self.versions
            .get(version::ORIGINAL)
            .map(|r| r.storage_key.as_str())
    }

    /// Every distinct storage key referenced by this record's versions.
    /// De-duplicated because the primary video thumbnail aliases one of the
    /// extracted frames.
    pub fn storage_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self
            .versions
            .values()
            .map(|r| r.storage_key.clone())
            .collect();
        keys.sort();
        keys.dedup();
        keys
    }

    /// Whether the versions map satisfies the completed-record invariant for
    /// this record's kind.
    pub fn has_complete_rendition_set(&self) -> bool {
        match self.kind {
            MediaKind::Image => {
                self.versions.len() == version::IMAGE_SET.len()
                    && version::IMAGE_SET
                        .iter()
                        .all(|name| self.versions.contains_key(*name))
            }
            MediaKind::Video => {
                self.versions.contains_key(version::TRANSCODED)
                    && self.versions.contains_key(version::THUMBNAIL)
                    && self.versions.contains_key(&version::video_thumbnail(0))
            }
        }
    }
}

/// List-view projection of a record. Versions are excluded from list
/// payloads for size; fetch a single record for the full map.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct MediaRecordSummary {
    pub id: Uuid,
    pub kind: MediaKind,
    pub status: MediaStatus,
    pub original_filename: String,
    pub declared_content_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<&MediaRecord> for MediaRecordSummary {
    fn from(record: &MediaRecord) -> Self {
        MediaRecordSummary {
            id: record.id,
            kind: record.kind,
            status: record.status,
            original_filename: record.original_filename.clone(),
            declared_content_type: record.declared_content_type.clone(),
            error_reason: record.error_reason.clone(),
            created_at: record.created_at,
        }
    }
}
