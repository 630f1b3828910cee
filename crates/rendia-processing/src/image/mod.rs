//! Image derivative generation.

pub mod engine;
pub mod resize;

pub use engine::{ImageDerivativeEngine, ImageDerivativeSet};
