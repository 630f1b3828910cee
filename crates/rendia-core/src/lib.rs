//! Core domain types for the rendia media pipeline.
//!
//! This crate holds the `MediaRecord`/`Rendition` data model, the unified
//! `AppError` type, and environment-driven configuration. It has no storage,
//! database, or HTTP dependencies; those layers live in their own crates.

pub mod config;
pub mod error;
pub mod models;

pub use config::{
    Config, ImageDerivativeConfig, StorageBackend, StorageConfig, VideoDerivativeConfig,
    VideoQualityPreset,
};
pub use error::{AppError, ErrorMetadata, LogLevel};
