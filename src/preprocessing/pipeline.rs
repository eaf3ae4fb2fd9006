use crate::config::PreprocessConfig;
use crate::error::OcrError;
use image::{DynamicImage, GrayImage};
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::Instant;
use tracing::warn;

use super::skew::SkewEstimator;
use super::steps;

/// Timing information for a single preprocessing step
#[derive(Debug, Clone, Serialize)]
pub struct StepTiming {
    pub name: String,
    pub time_ms: u64,
    /// Why the step was skipped, if it was
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

/// Result of preprocessing including timing stats
#[derive(Debug, Clone, Serialize)]
pub struct PreprocessingResult {
    /// Preprocessed image (not serialized)
    #[serde(skip)]
    pub image: GrayImage,
    /// Total preprocessing time in milliseconds
    pub total_time_ms: u64,
    /// Rotation applied by the deskew step, in degrees
    pub skew_angle: f32,
    /// Individual step timings
    pub steps: Vec<StepTiming>,
}

impl PreprocessingResult {
    pub fn skipped_steps(&self) -> impl Iterator<Item = &StepTiming> {
        self.steps.iter().filter(|s| s.skipped.is_some())
    }
}

/// Fixed chain of corrective transforms applied to every page.
///
/// Order: grayscale, upscale, denoise, contrast, deskew, morphology,
/// binarize, small-component removal. A step that fails or panics is
/// skipped and the next step receives the previous image, so `process`
/// always produces an image.
#[derive(Debug, Clone, Default)]
pub struct Preprocessor {
    config: PreprocessConfig,
    estimator: SkewEstimator,
}

impl Preprocessor {
    pub fn new(config: PreprocessConfig) -> Self {
        let estimator = SkewEstimator::new(config.skew.clone());
        Self { config, estimator }
    }

    pub fn config(&self) -> &PreprocessConfig {
        &self.config
    }

    /// Process an image. Deterministic for a given image and configuration.
    pub fn process(&self, image: &DynamicImage) -> PreprocessingResult {
        let start = Instant::now();
        let mut timings = Vec::new();
        let config = &self.config;

        let step_start = Instant::now();
        let mut img = steps::grayscale::apply(image);
        timings.push(StepTiming {
            name: "grayscale".to_string(),
            time_ms: step_start.elapsed().as_millis() as u64,
            skipped: None,
        });

        img = self.run_step("upscale", img, &mut timings, |i| {
            steps::upscale::apply(i, config.upscale_factor)
        });
        img = self.run_step("denoise", img, &mut timings, |i| {
            steps::denoise::apply(i, &config.denoise)
        });
        img = self.run_step("contrast", img, &mut timings, |i| {
            steps::clahe::apply(i, &config.clahe)
        });

        let mut skew_angle = 0.0;
        img = self.run_step("deskew", img, &mut timings, |i| {
            let (rotated, angle) = steps::deskew::apply(i, &self.estimator)?;
            skew_angle = angle;
            Ok(rotated)
        });

        img = self.run_step("morphology", img, &mut timings, |i| {
            steps::morphology::apply(i, config.morphology_radius)
        });
        img = self.run_step("binarize", img, &mut timings, |i| {
            steps::threshold::apply(i, &config.binarization)
        });
        img = self.run_step("components", img, &mut timings, |i| {
            steps::components::apply(i, config.min_component_area)
        });

        PreprocessingResult {
            image: img,
            total_time_ms: start.elapsed().as_millis() as u64,
            skew_angle,
            steps: timings,
        }
    }

    fn run_step<F>(
        &self,
        name: &str,
        img: GrayImage,
        timings: &mut Vec<StepTiming>,
        step_fn: F,
    ) -> GrayImage
    where
        F: FnOnce(&GrayImage) -> Result<GrayImage, OcrError>,
    {
        let step_start = Instant::now();
        let outcome = match catch_unwind(AssertUnwindSafe(|| step_fn(&img))) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err("step panicked".to_string()),
        };
        let time_ms = step_start.elapsed().as_millis() as u64;

        match outcome {
            Ok(result) => {
                timings.push(StepTiming {
                    name: name.to_string(),
                    time_ms,
                    skipped: None,
                });
                result
            }
            Err(reason) => {
                warn!(
                    step = name,
                    code = "PREPROCESSING_STAGE_SKIPPED",
                    reason = %reason,
                    "Preprocessing step skipped"
                );
                timings.push(StepTiming {
                    name: name.to_string(),
                    time_ms,
                    skipped: Some(reason),
                });
                img
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn text_like_page() -> DynamicImage {
        let img = GrayImage::from_fn(60, 40, |x, y| {
            let stroke = (y % 10 < 3) && (x % 12 < 8) && (5..55).contains(&x);
            let noise = ((x * 31 + y * 17) % 23) as u8;
            if stroke {
                Luma([40 + noise])
            } else {
                Luma([210 + noise])
            }
        });
        DynamicImage::ImageLuma8(img)
    }

    #[test]
    fn test_process_is_deterministic() {
        let preprocessor = Preprocessor::default();
        let page = text_like_page();
        let a = preprocessor.process(&page);
        let b = preprocessor.process(&page);
        assert_eq!(a.image, b.image);
    }

    #[test]
    fn test_process_runs_every_step_in_order() {
        let result = Preprocessor::default().process(&text_like_page());
        let names: Vec<&str> = result.steps.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(
            names,
            [
                "grayscale",
                "upscale",
                "denoise",
                "contrast",
                "deskew",
                "morphology",
                "binarize",
                "components"
            ]
        );
        assert_eq!(result.image.dimensions(), (120, 80));
        assert!(result.image.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255));
    }

    #[test]
    fn test_blank_page_skips_binarization_without_failing() {
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(50, 50, Luma([255])));
        let result = Preprocessor::default().process(&page);

        let skipped: Vec<&str> = result.skipped_steps().map(|s| s.name.as_str()).collect();
        assert_eq!(skipped, ["binarize"]);
        assert!(result.image.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_tiny_page_falls_through_to_previous_image() {
        let page = DynamicImage::ImageLuma8(GrayImage::from_pixel(2, 2, Luma([90])));
        let config = PreprocessConfig {
            upscale_factor: 1.0,
            ..PreprocessConfig::default()
        };
        let result = Preprocessor::new(config).process(&page);

        assert!(result.skipped_steps().any(|s| s.name == "denoise"));
        assert_eq!(result.image.dimensions(), (2, 2));
    }

    #[test]
    fn test_panicking_step_is_skipped() {
        let preprocessor = Preprocessor::default();
        let mut timings = Vec::new();
        let img = GrayImage::from_pixel(4, 4, Luma([7]));
        let result = preprocessor.run_step("explode", img.clone(), &mut timings, |_| {
            panic!("boom")
        });
        assert_eq!(result, img);
        assert_eq!(timings[0].skipped.as_deref(), Some("step panicked"));
    }
}
