//! Video derivative generation.

pub mod engine;
pub mod probe;

pub use engine::{VideoDerivativeEngine, VideoDerivativeSet};
pub use probe::{VideoMetadata, VideoProbe};
