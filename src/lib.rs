//! Accuracy-focused OCR for books captured as page screenshots.
//!
//! Each page is cleaned up by the [`preprocessing`] pipeline, recognized with
//! several engine profiles, and the most confident attempt becomes the page
//! text. [`book::BookPipeline`] runs pages in parallel and assembles the
//! transcript in page order.

pub mod book;
pub mod cli;
pub mod config;
pub mod engine;
pub mod engines;
pub mod error;
pub mod preprocessing;
pub mod profile;
pub mod recognition;

pub use book::{BookPipeline, BookTranscript, PageResult, RawPage, StopHandle};
pub use config::{EngineConfig, PipelineConfig, PreprocessConfig};
pub use engine::{OcrEngine, Recognition, Token};
pub use error::OcrError;
pub use profile::OcrProfile;
