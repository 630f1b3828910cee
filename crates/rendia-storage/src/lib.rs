//! Object storage abstraction for the rendia pipeline.
//!
//! The [`ObjectStorage`] trait is a uniform interface over a remote object
//! store: put, presigned put/get, head, delete, list, plus key generation in
//! [`keys`]. Backends: S3 (and S3-compatible providers) via `object_store`,
//! and a local filesystem backend for development and tests.
//!
//! **Key format:** originals live at
//! `{images|videos}/{owner_id}/{yyyy}/{mm}/{dd}/{uuid}.{ext}`; derived
//! renditions suffix a version tag before the extension.

pub mod keys;
pub mod local;
pub mod s3;
pub mod traits;

pub use local::LocalObjectStorage;
pub use s3::S3ObjectStorage;
pub use traits::{ObjectInfo, ObjectStorage, StorageError, StorageResult};
