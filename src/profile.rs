//! OCR configuration profiles
//!
//! A profile is one way of invoking the OCR engine: a page segmentation
//! assumption, a language pack and an engine mode. Several profiles are tried
//! per page to hedge against layout differences between pages.

use crate::error::OcrError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Page segmentation mode (Tesseract PSM numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentationMode {
    /// Automatic page segmentation with orientation and script detection
    AutoOsd,
    /// Fully automatic page segmentation
    Auto,
    /// Single column of text of variable sizes
    SingleColumn,
    /// Single uniform block of text
    SingleBlock,
    /// Single text line (captions)
    SingleLine,
    /// Single word (labels inside figures)
    SingleWord,
    /// As much text as possible in no particular order
    SparseText,
    /// Sparse text with orientation and script detection
    SparseTextOsd,
    /// Single text line, bypassing engine-specific layout hacks
    RawLine,
}

impl SegmentationMode {
    pub fn psm(&self) -> u8 {
        match self {
            Self::AutoOsd => 1,
            Self::Auto => 3,
            Self::SingleColumn => 4,
            Self::SingleBlock => 6,
            Self::SingleLine => 7,
            Self::SingleWord => 8,
            Self::SparseText => 11,
            Self::SparseTextOsd => 12,
            Self::RawLine => 13,
        }
    }

    pub fn from_psm(psm: u8) -> Option<Self> {
        match psm {
            1 => Some(Self::AutoOsd),
            3 => Some(Self::Auto),
            4 => Some(Self::SingleColumn),
            6 => Some(Self::SingleBlock),
            7 => Some(Self::SingleLine),
            8 => Some(Self::SingleWord),
            11 => Some(Self::SparseText),
            12 => Some(Self::SparseTextOsd),
            13 => Some(Self::RawLine),
            _ => None,
        }
    }

    /// Modes that treat the page as scattered words rather than flowing lines
    pub fn is_sparse(&self) -> bool {
        matches!(
            self,
            Self::SparseText | Self::SparseTextOsd | Self::SingleWord
        )
    }

    /// Modes that treat the whole image as one line
    pub fn is_single_line(&self) -> bool {
        matches!(self, Self::SingleLine | Self::RawLine)
    }
}

/// OCR engine mode (Tesseract OEM numbering)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum EngineMode {
    LegacyOnly,
    LstmOnly,
    Combined,
    #[default]
    Default,
}

impl EngineMode {
    pub fn oem(&self) -> u8 {
        match self {
            Self::LegacyOnly => 0,
            Self::LstmOnly => 1,
            Self::Combined => 2,
            Self::Default => 3,
        }
    }

    pub fn from_oem(oem: u8) -> Option<Self> {
        match oem {
            0 => Some(Self::LegacyOnly),
            1 => Some(Self::LstmOnly),
            2 => Some(Self::Combined),
            3 => Some(Self::Default),
            _ => None,
        }
    }
}

/// One OCR invocation strategy. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OcrProfile {
    pub segmentation: SegmentationMode,
    pub language: String,
    pub engine_mode: EngineMode,
}

impl OcrProfile {
    pub fn new(segmentation: SegmentationMode, language: impl Into<String>) -> Self {
        Self {
            segmentation,
            language: language.into(),
            engine_mode: EngineMode::Default,
        }
    }

    pub fn with_engine_mode(mut self, engine_mode: EngineMode) -> Self {
        self.engine_mode = engine_mode;
        self
    }
}

impl fmt::Display for OcrProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            self.segmentation.psm(),
            self.language,
            self.engine_mode.oem()
        )
    }
}

impl FromStr for OcrProfile {
    type Err = OcrError;

    /// Parse `PSM[:LANG[:OEM]]`, e.g. `6`, `6:jpn` or `6:jpn:1`.
    /// The language defaults to `eng` and the engine mode to 3.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || OcrError::InvalidProfile(s.to_string());
        let mut parts = s.trim().split(':');

        let psm = parts
            .next()
            .and_then(|p| p.trim().parse::<u8>().ok())
            .ok_or_else(invalid)?;
        let segmentation = SegmentationMode::from_psm(psm).ok_or_else(invalid)?;

        let language = match parts.next().map(str::trim) {
            Some("") => return Err(invalid()),
            Some(lang) => lang.to_string(),
            None => "eng".to_string(),
        };

        let engine_mode = match parts.next() {
            Some(oem) => oem
                .trim()
                .parse::<u8>()
                .ok()
                .and_then(EngineMode::from_oem)
                .ok_or_else(invalid)?,
            None => EngineMode::Default,
        };

        if parts.next().is_some() {
            return Err(invalid());
        }

        Ok(Self {
            segmentation,
            language,
            engine_mode,
        })
    }
}

/// Primary profiles, tried on every page, in preference order:
/// automatic layout, uniform block, variable column, automatic layout with
/// orientation detection, sparse text.
pub fn default_profiles(language: &str) -> Vec<OcrProfile> {
    [
        SegmentationMode::Auto,
        SegmentationMode::SingleBlock,
        SegmentationMode::SingleColumn,
        SegmentationMode::AutoOsd,
        SegmentationMode::SparseText,
    ]
    .into_iter()
    .map(|mode| OcrProfile::new(mode, language))
    .collect()
}

/// Profiles for figure and diagram pages, used only when the primary pass
/// yields no text.
pub fn default_fallback_profiles(language: &str) -> Vec<OcrProfile> {
    [
        SegmentationMode::SingleWord,
        SegmentationMode::SingleLine,
        SegmentationMode::SparseTextOsd,
        SegmentationMode::RawLine,
    ]
    .into_iter()
    .map(|mode| OcrProfile::new(mode, language))
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_profile() {
        let profile: OcrProfile = "6:jpn:1".parse().unwrap();
        assert_eq!(profile.segmentation, SegmentationMode::SingleBlock);
        assert_eq!(profile.language, "jpn");
        assert_eq!(profile.engine_mode, EngineMode::LstmOnly);
    }

    #[test]
    fn test_parse_defaults_language_and_engine_mode() {
        let profile: OcrProfile = "11".parse().unwrap();
        assert_eq!(profile.segmentation, SegmentationMode::SparseText);
        assert_eq!(profile.language, "eng");
        assert_eq!(profile.engine_mode, EngineMode::Default);
    }

    #[test]
    fn test_display_matches_parse_format() {
        let profile = OcrProfile::new(SegmentationMode::RawLine, "deu");
        assert_eq!(profile.to_string(), "13:deu:3");
    }

    #[test]
    fn test_rejects_unknown_psm_and_garbage() {
        assert!("2".parse::<OcrProfile>().is_err());
        assert!("abc".parse::<OcrProfile>().is_err());
        assert!("6::3".parse::<OcrProfile>().is_err());
        assert!("6:eng:9".parse::<OcrProfile>().is_err());
        assert!("6:eng:3:extra".parse::<OcrProfile>().is_err());
    }

    #[test]
    fn test_default_profile_set_has_five_distinct_modes() {
        let profiles = default_profiles("eng");
        assert_eq!(profiles.len(), 5);
        assert_eq!(profiles[0].segmentation, SegmentationMode::Auto);
        let modes: std::collections::HashSet<u8> =
            profiles.iter().map(|p| p.segmentation.psm()).collect();
        assert_eq!(modes.len(), 5);
    }

    #[test]
    fn test_fallback_profiles_do_not_repeat_primary_ones() {
        let primary = default_profiles("jpn");
        let fallback = default_fallback_profiles("jpn");
        assert!(fallback.iter().all(|p| !primary.contains(p)));
    }
}
