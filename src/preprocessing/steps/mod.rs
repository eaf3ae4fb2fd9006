//! Individual preprocessing steps

pub mod clahe;
pub mod components;
pub mod denoise;
pub mod deskew;
pub mod grayscale;
pub mod morphology;
pub mod threshold;
pub mod upscale;
