use crate::config::DEFAULT_MIN_COMPONENT_AREA;
use crate::profile::OcrProfile;
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "book-ocr")]
#[command(about = "Convert a directory of page screenshots into one OCR transcript")]
#[command(version)]
pub struct Args {
    /// Directory holding the page images, ordered by file name
    #[arg(long, env = "OCR_INPUT_DIR")]
    pub input: PathBuf,

    /// Transcript file to write
    #[arg(long, env = "OCR_OUTPUT")]
    pub output: PathBuf,

    /// OCR engine to use (defaults to the first compiled-in engine)
    #[arg(long, env = "OCR_ENGINE")]
    pub engine: Option<String>,

    /// Language pack for the default profiles (e.g., "eng", "jpn")
    #[arg(long, env = "OCR_LANGUAGE", default_value = "eng")]
    pub language: String,

    /// OCR profile as PSM[:LANG[:OEM]]; repeat to build the ordered profile set
    #[arg(long = "profile", value_parser = clap::value_parser!(OcrProfile))]
    pub profiles: Vec<OcrProfile>,

    /// Profile tried only when the primary profiles find no text; repeatable
    #[arg(long = "fallback-profile", value_parser = clap::value_parser!(OcrProfile))]
    pub fallback_profiles: Vec<OcrProfile>,

    /// Disable the fallback profile pass
    #[arg(long, env = "OCR_NO_FALLBACK")]
    pub no_fallback: bool,

    /// Pages processed concurrently (default: available cores, at most 4)
    #[arg(long, env = "OCR_WORKERS")]
    pub workers: Option<usize>,

    /// OCR attempts running concurrently (default: same as --workers)
    #[arg(long, env = "OCR_ATTEMPT_WORKERS")]
    pub attempt_workers: Option<usize>,

    /// Timeout for a single OCR attempt, in seconds
    #[arg(long, env = "OCR_ATTEMPT_TIMEOUT", default_value = "60")]
    pub attempt_timeout_secs: u64,

    /// Minimum connected-component area (pixels) kept after binarization
    #[arg(long, env = "OCR_MIN_COMPONENT_AREA", default_value_t = DEFAULT_MIN_COMPONENT_AREA)]
    pub min_component_area: u32,

    /// Binarization method: global Otsu, or local Sauvola for uneven lighting
    #[arg(long, env = "OCR_BINARIZATION", value_enum, default_value_t = BinarizationMethod::Otsu)]
    pub binarization: BinarizationMethod,

    /// Largest skew angle (degrees) the deskew stage will correct
    #[arg(long, env = "OCR_MAX_SKEW_ANGLE", default_value = "15")]
    pub max_skew_angle: f32,

    /// Tokens at or below this confidence are ignored when scoring an attempt
    #[arg(long, env = "OCR_MIN_TOKEN_CONFIDENCE", default_value = "0")]
    pub min_token_confidence: f32,

    /// Resume from the checkpoint of a previous, interrupted run
    #[arg(long)]
    pub resume: bool,

    /// Checkpoint file (default: <output>.checkpoint.json)
    #[arg(long, env = "OCR_CHECKPOINT")]
    pub checkpoint: Option<PathBuf>,

    /// Finalized pages between checkpoint writes
    #[arg(long, env = "OCR_CHECKPOINT_INTERVAL", default_value = "5")]
    pub checkpoint_interval: usize,

    /// Text inserted between pages in the transcript
    #[arg(long, env = "OCR_PAGE_SEPARATOR", default_value = "\n\n")]
    pub page_separator: String,

    /// Directory for downloaded models and tessdata
    #[arg(long, env = "OCR_CACHE_DIR")]
    pub cache_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "RUST_LOG", default_value = "info")]
    pub log_level: String,
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum BinarizationMethod {
    Otsu,
    Sauvola,
}

impl Args {
    pub fn checkpoint_path(&self) -> PathBuf {
        self.checkpoint.clone().unwrap_or_else(|| {
            let mut name = self.output.as_os_str().to_owned();
            name.push(".checkpoint.json");
            PathBuf::from(name)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkpoint_path_defaults_next_to_output() {
        let args = Args::parse_from(["book-ocr", "--input", "in", "--output", "out/book.txt"]);
        assert_eq!(
            args.checkpoint_path(),
            PathBuf::from("out/book.txt.checkpoint.json")
        );
    }

    #[test]
    fn test_invalid_profile_is_rejected_by_parser() {
        let result = Args::try_parse_from([
            "book-ocr", "--input", "in", "--output", "o.txt", "--profile", "99",
        ]);
        assert!(result.is_err());
    }
}
