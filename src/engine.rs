use crate::error::OcrError;
use crate::profile::OcrProfile;
use image::GrayImage;

/// A recognized word with its engine-reported confidence (0-100)
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub text: String,
    pub confidence: f32,
}

/// Raw output of one engine invocation
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Recognition {
    pub text: String,
    /// Word-level scores, when the engine reports them
    pub tokens: Vec<Token>,
    /// Page-level score (0-100), for engines without word-level scores
    pub mean_confidence: Option<f32>,
}

impl Recognition {
    pub fn from_tokens(text: impl Into<String>, tokens: Vec<Token>) -> Self {
        Self {
            text: text.into(),
            tokens,
            mean_confidence: None,
        }
    }

    pub fn with_confidence(text: impl Into<String>, confidence: f32) -> Self {
        Self {
            text: text.into(),
            tokens: Vec::new(),
            mean_confidence: Some(confidence),
        }
    }
}

/// Trait that all OCR engines must implement.
///
/// Implementations are shared between concurrent attempts, so `recognize`
/// must not mutate engine state.
pub trait OcrEngine: Send + Sync {
    /// Returns the engine identifier (e.g., "ocrs", "leptess")
    fn name(&self) -> &'static str;

    /// Returns a human-readable description of the engine
    fn description(&self) -> &'static str;

    /// Recognize text in a preprocessed page using one profile
    fn recognize(&self, image: &GrayImage, profile: &OcrProfile) -> Result<Recognition, OcrError>;

    /// Get supported languages
    fn supported_languages(&self) -> Vec<String>;
}

/// Collapse runs of newlines and trim surrounding whitespace
pub fn normalize_text(text: &str) -> String {
    text.trim()
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_blank_lines() {
        let text = "\n  first line  \n\n\n second line\n\n";
        assert_eq!(normalize_text(text), "first line\n second line");
    }

    #[test]
    fn test_normalize_empty_text() {
        assert_eq!(normalize_text("   \n\n "), "");
    }
}
