//! Image preprocessing module for OCR enhancement
//!
//! Turns a raw page screenshot into a clean, upright, binarized image.

pub mod pipeline;
pub mod skew;
pub mod steps;

pub use pipeline::{PreprocessingResult, Preprocessor, StepTiming};
pub use skew::{SkewConfig, SkewEstimator};
