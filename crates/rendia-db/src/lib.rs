//! Media record persistence.
//!
//! [`MediaRecordRepository`] is the persistence seam for the pipeline. The
//! Postgres implementation is the production store; the in-memory one backs
//! tests and ephemeral deployments. Both enforce the same compare-and-set
//! semantics on status transitions, which is what makes the confirmation
//! gate idempotent.

pub mod memory;
pub mod postgres;
pub mod repository;

pub use memory::InMemoryMediaRecordRepository;
pub use postgres::PostgresMediaRecordRepository;
pub use repository::{CompletionDetails, MediaRecordRepository};
