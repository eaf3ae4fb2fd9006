//! OCRS engine implementation
//!
//! Pure Rust OCR engine using the ocrs library. No system dependencies required.
//! Downloads neural network models automatically on first use.

use crate::config::EngineConfig;
use crate::engine::{OcrEngine, Recognition};
use crate::error::OcrError;
use crate::profile::OcrProfile;
use image::{DynamicImage, GrayImage};
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsOcrEngine, OcrEngineParams};
use rten::Model;

use super::download::ensure_cached;

/// Default model URLs from the ocrs project
const DETECTION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-detection.rten";
const RECOGNITION_MODEL_URL: &str =
    "https://ocrs-models.s3-accelerate.amazonaws.com/text-recognition.rten";

/// OCR Engine wrapping the ocrs library.
///
/// ocrs has no segmentation modes, so profiles change how detected words
/// are grouped before recognition: sparse modes read every word on its
/// own, single-line modes read the page as one line, the rest use the
/// detected text lines.
pub struct OcrsEngine {
    engine: OcrsOcrEngine,
}

impl OcrsEngine {
    /// Create a new OCR processor, downloading models if needed
    pub fn new(config: &EngineConfig) -> Result<Self, OcrError> {
        tracing::info!("Initializing ocrs OCR engine...");

        let models_dir = config.cache_dir.join("models");
        let detection_model_path =
            ensure_cached(&models_dir, "text-detection.rten", DETECTION_MODEL_URL)?;
        let recognition_model_path =
            ensure_cached(&models_dir, "text-recognition.rten", RECOGNITION_MODEL_URL)?;

        let detection_model = Model::load_file(&detection_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load detection model: {}", e))
        })?;
        let recognition_model = Model::load_file(&recognition_model_path).map_err(|e| {
            OcrError::InitializationError(format!("Failed to load recognition model: {}", e))
        })?;

        let engine = OcrsOcrEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: DecodeMethod::Greedy,
            ..Default::default()
        })
        .map_err(|e| {
            OcrError::InitializationError(format!("Failed to create OCR engine: {}", e))
        })?;

        if config.languages.iter().any(|l| l != "eng") {
            tracing::warn!(
                languages = ?config.languages,
                "ocrs only reads Latin script; non-English profiles will use its English model"
            );
        }
        tracing::info!("ocrs engine initialized successfully");

        Ok(Self { engine })
    }
}

impl OcrEngine for OcrsEngine {
    fn name(&self) -> &'static str {
        "ocrs"
    }

    fn description(&self) -> &'static str {
        "Pure Rust OCR engine - fast, no system dependencies required"
    }

    fn recognize(&self, image: &GrayImage, profile: &OcrProfile) -> Result<Recognition, OcrError> {
        // HWC RGB is the layout ImageSource::from_bytes expects
        let rgb_img = DynamicImage::ImageLuma8(image.clone()).into_rgb8();
        let dimensions = rgb_img.dimensions();

        let img_source = ImageSource::from_bytes(rgb_img.as_raw(), dimensions).map_err(|e| {
            OcrError::ProcessingError(format!("Failed to create image source: {}", e))
        })?;

        let ocr_input = self
            .engine
            .prepare_input(img_source)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to prepare input: {}", e)))?;

        let word_rects = self
            .engine
            .detect_words(&ocr_input)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to detect words: {}", e)))?;

        let mode = profile.segmentation;
        let line_rects = if mode.is_sparse() {
            word_rects.iter().map(|rect| vec![rect.clone()]).collect()
        } else {
            self.engine.find_text_lines(&ocr_input, &word_rects)
        };

        let line_texts = self
            .engine
            .recognize_text(&ocr_input, &line_rects)
            .map_err(|e| OcrError::ProcessingError(format!("Failed to recognize text: {}", e)))?;

        let lines: Vec<String> = line_texts
            .iter()
            .filter_map(|line| line.as_ref())
            .map(|line| {
                line.words()
                    .map(|word| word.to_string())
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .filter(|line| !line.trim().is_empty())
            .collect();

        let separator = if mode.is_single_line() { " " } else { "\n" };
        let text = lines.join(separator);

        // No per-word scores from ocrs; rate the text itself
        let confidence = calculate_confidence(&text) * 100.0;

        Ok(Recognition::with_confidence(text, confidence))
    }

    fn supported_languages(&self) -> Vec<String> {
        // ocrs currently only supports English/Latin alphabet
        vec!["eng".to_string()]
    }
}

// ============================================================================
// Confidence scoring heuristics
// ============================================================================

/// Calculate confidence score (0-1) based on text quality heuristics.
///
/// Since ocrs doesn't provide per-character confidence scores, we analyze
/// the recognized text for patterns that indicate OCR quality.
fn calculate_confidence(text: &str) -> f32 {
    if text.is_empty() {
        return 0.0;
    }
    if text.chars().count() < 5 {
        return 0.5; // Too short to judge accurately
    }

    let char_score = analyze_char_frequency(text);
    let word_score = analyze_word_lengths(text);
    let whitespace_score = analyze_whitespace(text);
    let repetition_score = detect_repetition(text);

    let confidence =
        0.40 * char_score + 0.30 * word_score + 0.15 * whitespace_score + 0.15 * repetition_score;

    confidence.clamp(0.0, 1.0)
}

/// Analyze character frequency for signs of garbled OCR.
///
/// Penalizes text with too many special/control characters or too few letters.
fn analyze_char_frequency(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }

    let letters = text.chars().filter(|c| c.is_alphabetic()).count();
    let special = text
        .chars()
        .filter(|c| !c.is_alphanumeric() && !c.is_whitespace() && !c.is_ascii_punctuation())
        .count();

    let special_ratio = special as f32 / total as f32;
    let special_penalty = 1.0 - (special_ratio * 10.0).min(1.0);

    let letter_ratio = letters as f32 / total as f32;
    let letter_score = (letter_ratio * 1.5).min(1.0);

    special_penalty * 0.6 + letter_score * 0.4
}

/// Analyze word length distribution.
///
/// Garbled OCR often produces single-character "words" or very long sequences.
fn analyze_word_lengths(text: &str) -> f32 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.5;
    }

    let total_len: usize = words.iter().map(|w| w.chars().count()).sum();
    let avg_len = total_len as f32 / words.len() as f32;

    let avg_score = match avg_len as usize {
        0..=1 => 0.3,
        2..=3 => 0.7,
        4..=8 => 1.0,
        9..=12 => 0.8,
        _ => 0.4,
    };

    let single_count = words.iter().filter(|w| w.chars().count() == 1).count();
    let single_ratio = single_count as f32 / words.len() as f32;
    let single_penalty = 1.0 - (single_ratio * 1.5).min(0.5);

    avg_score * single_penalty
}

/// Analyze whitespace ratio.
///
/// Normal text has ~10-25% whitespace.
fn analyze_whitespace(text: &str) -> f32 {
    let total = text.chars().count();
    if total == 0 {
        return 0.0;
    }

    let whitespace = text.chars().filter(|c| c.is_whitespace()).count();
    let ratio = (whitespace as f32 / total as f32) * 100.0;

    match ratio as usize {
        0..=5 => 0.5,
        6..=10 => 0.8,
        11..=25 => 1.0,
        26..=40 => 0.7,
        _ => 0.3,
    }
}

/// Detect repeated character sequences like "aaaa" or "####"
fn detect_repetition(text: &str) -> f32 {
    let mut max_repeat = 1;
    let mut current = 1;
    let mut prev: Option<char> = None;

    for c in text.chars() {
        if Some(c) == prev && !c.is_whitespace() {
            current += 1;
            max_repeat = max_repeat.max(current);
        } else {
            current = 1;
        }
        prev = Some(c);
    }

    match max_repeat {
        1..=3 => 1.0,
        4..=5 => 0.8,
        6..=10 => 0.5,
        _ => 0.2,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_text_returns_zero() {
        assert_eq!(calculate_confidence(""), 0.0);
    }

    #[test]
    fn test_short_text_returns_half() {
        assert_eq!(calculate_confidence("Hi"), 0.5);
        assert_eq!(calculate_confidence("図表"), 0.5);
    }

    #[test]
    fn test_caption_scores_higher_than_noise() {
        let caption = calculate_confidence("Figure 2: Page layout of the sample chapter");
        let noise = calculate_confidence("§± ®© ¥€ £¢ ¤ƒ");
        assert!(caption > 0.75, "Expected > 0.75, got {}", caption);
        assert!(noise < 0.5, "Expected < 0.5, got {}", noise);
    }

    #[test]
    fn test_repeated_chars_lower_confidence() {
        let text = "Hello aaaaaaaaaaaa World";
        let confidence = calculate_confidence(text);
        assert!(confidence < 0.9, "Expected < 0.9, got {}", confidence);
    }

    #[test]
    fn test_single_char_words_lower_confidence() {
        let text = "a b c d e f g h i j k l m n o p";
        let confidence = calculate_confidence(text);
        assert!(confidence < 0.7, "Expected < 0.7, got {}", confidence);
    }

    #[test]
    fn test_word_lengths_count_characters_not_bytes() {
        // Three-character words in a multi-byte script
        let score = analyze_word_lengths("日本語 文字列 三文字");
        assert_eq!(score, 0.7);
    }

    #[test]
    fn test_detect_repetition() {
        assert_eq!(detect_repetition("Hello World"), 1.0);
        assert!(detect_repetition("Hellooooo World") < 1.0);
    }
}
