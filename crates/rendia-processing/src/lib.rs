//! Derivative generation for the rendia media pipeline.
//!
//! Two engines turn one uploaded source into a fixed rendition set: the
//! image engine (decode once, derive capped original + thumbnail +
//! small/medium/large, upload concurrently) and the video engine (ffprobe,
//! one normalized transcode, N evenly spaced still-frame thumbnails). The
//! [`ingest`] module wires them behind the upload intake / confirmation /
//! deletion flow.
//!
//! Both engines are all-or-nothing: a failure in any branch fails the whole
//! invocation and no partial rendition set is ever committed.

pub mod error;
pub mod image;
pub mod ingest;
pub mod video;

pub use error::ProcessingError;
pub use ingest::{
    ConfirmReceipt, DeletionReport, LogSearchIndexNotifier, MediaIngestService,
    SearchIndexNotifier, UploadTicket,
};
