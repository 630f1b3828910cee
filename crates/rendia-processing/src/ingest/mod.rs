//! Upload intake, confirmation, background processing, and deletion.

pub mod notifier;
pub mod service;

pub use notifier::{LogSearchIndexNotifier, SearchIndexNotifier};
pub use service::{ConfirmReceipt, DeletionReport, MediaIngestService, UploadTicket};
