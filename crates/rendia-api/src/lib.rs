//! HTTP surface for the rendia media pipeline.
//!
//! Thin axum layer over [`rendia_processing::MediaIngestService`]: request
//! DTOs in, `AppError`-mapped JSON errors out. Authentication happens
//! upstream; this service trusts the owner identity header the gateway
//! injects and enforces ownership equality only.

pub mod auth;
pub mod constants;
pub mod error;
pub mod handlers;
pub mod setup;
pub mod state;
