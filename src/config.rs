use crate::cli::{Args, BinarizationMethod};
use crate::preprocessing::skew::SkewConfig;
use crate::preprocessing::steps::clahe::ClaheParams;
use crate::preprocessing::steps::denoise::DenoiseParams;
use crate::preprocessing::steps::threshold::Binarization;
use crate::profile::{self, OcrProfile};
use std::path::PathBuf;
use std::time::Duration;

/// Default small-component area threshold, in pixels of the upscaled page
pub const DEFAULT_MIN_COMPONENT_AREA: u32 = 50;

/// Image preprocessing configuration
#[derive(Debug, Clone)]
pub struct PreprocessConfig {
    /// Linear resampling factor applied before everything else
    pub upscale_factor: f32,
    pub denoise: DenoiseParams,
    pub clahe: ClaheParams,
    pub skew: SkewConfig,
    /// Radius of the square structuring element; 0 disables the stage
    pub morphology_radius: u32,
    pub binarization: Binarization,
    /// Connected components smaller than this are treated as noise
    pub min_component_area: u32,
}

impl Default for PreprocessConfig {
    fn default() -> Self {
        Self {
            upscale_factor: 2.0,
            denoise: DenoiseParams::default(),
            clahe: ClaheParams::default(),
            skew: SkewConfig::default(),
            morphology_radius: 1,
            binarization: Binarization::Otsu,
            min_component_area: DEFAULT_MIN_COMPONENT_AREA,
        }
    }
}

/// Configuration consumed by the page and book pipelines
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Ordered primary profiles; earlier profiles win confidence ties
    pub profiles: Vec<OcrProfile>,
    /// Ordered profiles tried only when the primary pass yields no text
    pub fallback_profiles: Vec<OcrProfile>,
    pub attempt_timeout: Duration,
    /// Pages processed concurrently
    pub page_workers: usize,
    /// OCR attempts running concurrently across all pages
    pub attempt_workers: usize,
    /// Tokens at or below this confidence are left out of the attempt score
    pub min_token_confidence: f32,
    /// Finalized pages between checkpoint writes
    pub checkpoint_interval: usize,
    pub preprocess: PreprocessConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let workers = default_workers();
        Self {
            profiles: profile::default_profiles("eng"),
            fallback_profiles: profile::default_fallback_profiles("eng"),
            attempt_timeout: Duration::from_secs(60),
            page_workers: workers,
            attempt_workers: workers,
            min_token_confidence: 0.0,
            checkpoint_interval: 5,
            preprocess: PreprocessConfig::default(),
        }
    }
}

/// Up to four workers, bounded by the available cores
pub fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        .clamp(1, 4)
}

/// Engine initialization settings
#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    /// Language packs needed by the configured profiles
    pub languages: Vec<String>,
    /// Where downloaded models and tessdata are kept
    pub cache_dir: PathBuf,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            languages: vec!["eng".to_string()],
            cache_dir: default_cache_dir(),
        }
    }
}

impl EngineConfig {
    /// Every distinct language used by the primary and fallback profiles
    pub fn for_pipeline(pipeline: &PipelineConfig, cache_dir: Option<PathBuf>) -> Self {
        let mut languages: Vec<String> = Vec::new();
        for profile in pipeline.profiles.iter().chain(&pipeline.fallback_profiles) {
            if !languages.contains(&profile.language) {
                languages.push(profile.language.clone());
            }
        }
        if languages.is_empty() {
            languages.push("eng".to_string());
        }
        Self {
            languages,
            cache_dir: cache_dir.unwrap_or_else(default_cache_dir),
        }
    }
}

pub fn default_cache_dir() -> PathBuf {
    dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("book-ocr")
}

impl From<&Args> for PipelineConfig {
    fn from(args: &Args) -> Self {
        let profiles = if args.profiles.is_empty() {
            profile::default_profiles(&args.language)
        } else {
            args.profiles.clone()
        };
        let fallback_profiles = if args.no_fallback {
            Vec::new()
        } else if args.fallback_profiles.is_empty() {
            profile::default_fallback_profiles(&args.language)
        } else {
            args.fallback_profiles.clone()
        };
        let workers = args.workers.unwrap_or_else(default_workers).max(1);

        let mut preprocess = PreprocessConfig {
            min_component_area: args.min_component_area,
            binarization: match args.binarization {
                BinarizationMethod::Otsu => Binarization::Otsu,
                BinarizationMethod::Sauvola => Binarization::sauvola(),
            },
            ..PreprocessConfig::default()
        };
        preprocess.skew.max_angle = args.max_skew_angle.abs();

        Self {
            profiles,
            fallback_profiles,
            attempt_timeout: Duration::from_secs(args.attempt_timeout_secs.max(1)),
            page_workers: workers,
            attempt_workers: args.attempt_workers.unwrap_or(workers).max(1),
            min_token_confidence: args.min_token_confidence,
            checkpoint_interval: args.checkpoint_interval,
            preprocess,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_args_map_onto_pipeline_config() {
        let args = Args::parse_from([
            "book-ocr",
            "--input",
            "pages",
            "--output",
            "book.txt",
            "--language",
            "jpn",
            "--workers",
            "3",
            "--min-component-area",
            "80",
            "--max-skew-angle",
            "10",
        ]);
        let config = PipelineConfig::from(&args);

        assert_eq!(config.profiles.len(), 5);
        assert!(config.profiles.iter().all(|p| p.language == "jpn"));
        assert_eq!(config.page_workers, 3);
        assert_eq!(config.attempt_workers, 3);
        assert_eq!(config.preprocess.min_component_area, 80);
        assert_eq!(config.preprocess.skew.max_angle, 10.0);
        assert_eq!(config.preprocess.binarization, Binarization::Otsu);
    }

    #[test]
    fn test_sauvola_binarization_flag() {
        let args = Args::parse_from([
            "book-ocr",
            "--input",
            "pages",
            "--output",
            "book.txt",
            "--binarization",
            "sauvola",
        ]);
        let config = PipelineConfig::from(&args);
        assert_eq!(config.preprocess.binarization, Binarization::sauvola());

        let bad = Args::try_parse_from([
            "book-ocr",
            "--input",
            "pages",
            "--output",
            "book.txt",
            "--binarization",
            "adaptive",
        ]);
        assert!(bad.is_err());
    }

    #[test]
    fn test_explicit_profiles_replace_defaults() {
        let args = Args::parse_from([
            "book-ocr",
            "--input",
            "pages",
            "--output",
            "book.txt",
            "--profile",
            "6:eng",
            "--profile",
            "11:eng",
            "--no-fallback",
        ]);
        let config = PipelineConfig::from(&args);

        assert_eq!(config.profiles.len(), 2);
        assert_eq!(config.profiles[1].to_string(), "11:eng:3");
        assert!(config.fallback_profiles.is_empty());
    }

    #[test]
    fn test_engine_config_collects_profile_languages() {
        let args = Args::parse_from([
            "book-ocr",
            "--input",
            "pages",
            "--output",
            "book.txt",
            "--profile",
            "6:jpn",
            "--profile",
            "6:eng",
            "--fallback-profile",
            "8:jpn",
            "--cache-dir",
            "/tmp/models",
        ]);
        let pipeline = PipelineConfig::from(&args);
        let engine = EngineConfig::for_pipeline(&pipeline, args.cache_dir.clone());

        assert_eq!(engine.languages, ["jpn", "eng"]);
        assert_eq!(engine.cache_dir, PathBuf::from("/tmp/models"));
    }
}
