use crate::error::OcrError;
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Maximum output dimension to avoid memory issues
const MAX_DIMENSION: u32 = 8000;

/// Resample the page by `factor` in both dimensions with a bicubic filter.
/// Small screenshot fonts become large enough for the recognizer.
pub fn apply(image: &GrayImage, factor: f32) -> Result<GrayImage, OcrError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::PreprocessingError("empty image".to_string()));
    }
    if !factor.is_finite() || factor <= 0.0 {
        return Err(OcrError::PreprocessingError(format!(
            "invalid upscale factor {}",
            factor
        )));
    }

    let mut new_width = (width as f32 * factor).round() as u32;
    let mut new_height = (height as f32 * factor).round() as u32;

    // Clamp to max dimension, keeping the aspect ratio
    if new_width > MAX_DIMENSION || new_height > MAX_DIMENSION {
        if new_width >= new_height {
            new_height = ((new_height as u64 * MAX_DIMENSION as u64 / new_width as u64) as u32).max(1);
            new_width = MAX_DIMENSION;
        } else {
            new_width = ((new_width as u64 * MAX_DIMENSION as u64 / new_height as u64) as u32).max(1);
            new_height = MAX_DIMENSION;
        }
    }

    if (new_width, new_height) == (width, height) {
        return Ok(image.clone());
    }

    // CatmullRom is the bicubic filter; it avoids Lanczos ringing around glyph edges
    Ok(imageops::resize(
        image,
        new_width,
        new_height,
        FilterType::CatmullRom,
    ))
}
