//! Leptess/Tesseract engine implementation
//!
//! Tesseract-based OCR engine. Honors the segmentation mode and language of
//! each profile and reports word-level confidences.
//! Uses tesseract-static crate for static linking (no system dependencies).
//! Downloads tessdata (training data) automatically on first use.

use crate::config::EngineConfig;
use crate::engine::{OcrEngine, Recognition};
use crate::error::OcrError;
use crate::profile::OcrProfile;
use image::GrayImage;
use tesseract_static::tesseract::Tesseract;

use super::download::ensure_cached;
use super::tsv;

/// Tesseract OCR Engine
pub struct LeptessEngine {
    /// Path to tessdata directory
    tessdata_path: String,
    /// Languages with downloaded training data
    languages: Vec<String>,
}

impl LeptessEngine {
    /// Create a new Tesseract-based OCR engine, fetching tessdata for every
    /// configured language
    pub fn new(config: &EngineConfig) -> Result<Self, OcrError> {
        let tessdata_dir = config.cache_dir.join("tessdata");
        for language in &config.languages {
            let filename = format!("{}.traineddata", language);
            ensure_cached(&tessdata_dir, &filename, &tessdata_url(language))?;
        }

        let tessdata_path = tessdata_dir
            .to_str()
            .map(|s| s.to_string())
            .ok_or_else(|| OcrError::InitializationError("Invalid tessdata path".to_string()))?;

        // Validate that tessdata is accessible by doing a test initialization
        for language in &config.languages {
            let test_tess = Tesseract::new(Some(&tessdata_path), Some(language)).map_err(|e| {
                OcrError::InitializationError(format!(
                    "Failed to initialize Tesseract for '{}': {}",
                    language, e
                ))
            })?;
            drop(test_tess);
        }

        tracing::info!(
            "Leptess engine initialized (tessdata: {}, languages: {})",
            tessdata_path,
            config.languages.join("+")
        );

        Ok(Self {
            tessdata_path,
            languages: config.languages.clone(),
        })
    }
}

impl OcrEngine for LeptessEngine {
    fn name(&self) -> &'static str {
        "leptess"
    }

    fn description(&self) -> &'static str {
        "Tesseract-based OCR - per-profile page segmentation, word confidences"
    }

    fn recognize(&self, image: &GrayImage, profile: &OcrProfile) -> Result<Recognition, OcrError> {
        let (width, height) = image.dimensions();

        // Convert to BMP in memory (BMP is always supported by leptonica)
        let mut bmp_data = Vec::new();
        image
            .write_to(&mut std::io::Cursor::new(&mut bmp_data), image::ImageFormat::Bmp)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to convert to BMP: {}", e)))?;

        tracing::debug!(
            profile = %profile,
            "Processing image: {}x{}, BMP size: {} bytes",
            width,
            height,
            bmp_data.len()
        );

        let tess = Tesseract::new(Some(&self.tessdata_path), Some(&profile.language))
            .map_err(|e| OcrError::ProcessingError(format!("Failed to create Tesseract: {}", e)))?;

        let tess = tess
            .set_variable(
                "tessedit_pageseg_mode",
                &profile.segmentation.psm().to_string(),
            )
            .map_err(|e| {
                OcrError::ProcessingError(format!("Failed to set segmentation mode: {}", e))
            })?;

        let tess = tess.set_image_from_mem(&bmp_data).map_err(|e| {
            OcrError::ProcessingError(format!(
                "Failed to set image ({}x{}, {} bytes): {}",
                width,
                height,
                bmp_data.len(),
                e
            ))
        })?;

        let mut tess = tess
            .recognize()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let text = tess
            .get_text()
            .map_err(|e| OcrError::ProcessingError(format!("Failed to get text: {}", e)))?;

        // Word scores come from the TSV dump; plain text is still usable
        // when that fails
        match tess.get_tsv_text(0) {
            Ok(dump) => {
                let page = tsv::parse(&dump);
                Ok(Recognition::from_tokens(text.trim(), page.tokens))
            }
            Err(e) => Err(OcrError::PartialOutput {
                text: text.trim().to_string(),
                reason: format!("Failed to get word confidences: {}", e),
            }),
        }
    }

    fn supported_languages(&self) -> Vec<String> {
        self.languages.clone()
    }
}

/// Get tessdata download URL for a language
fn tessdata_url(language: &str) -> String {
    // Use tessdata_fast for smaller, faster downloads
    format!(
        "https://github.com/tesseract-ocr/tessdata_fast/raw/main/{}.traineddata",
        language
    )
}
