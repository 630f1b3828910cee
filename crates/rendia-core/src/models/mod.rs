pub mod media;

pub use media::{
    version, MediaKind, MediaRecord, MediaRecordSummary, MediaStatus, Rendition, RenditionPurpose,
    VersionMap,
};
