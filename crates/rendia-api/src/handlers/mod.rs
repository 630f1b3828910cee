//! HTTP handlers.

pub mod confirm_upload;
pub mod health;
pub mod media_delete;
pub mod media_get;
pub mod presigned_upload;
