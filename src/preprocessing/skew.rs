//! Page skew estimation
//!
//! Text lines and rules on a page produce long straight edges. Their common
//! direction, found with a Hough transform over the edge map, is the page
//! skew.

use image::imageops::{self, FilterType};
use image::GrayImage;
use imageproc::edges::canny;
use tracing::debug;

/// Larger pages are downscaled before line detection; angles are scale invariant
const ANALYSIS_MAX_DIMENSION: u32 = 1600;

/// Smallest side that can hold a meaningful line population
const MIN_DIMENSION: u32 = 16;

/// Peaks closer than this in both angle and distance are the same line
const PEAK_ANGLE_RADIUS_DEG: f32 = 1.0;
const PEAK_RHO_RADIUS: i64 = 5;

/// Skew search and line detection parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SkewConfig {
    /// Search range is [-max_angle, max_angle] degrees
    pub max_angle: f32,
    /// Angular resolution of the Hough accumulator, in degrees
    pub angle_step: f32,
    /// Fewer detected lines than this means no skew evidence
    pub min_lines: usize,
    /// Votes a line needs, as a fraction of the image width
    pub vote_fraction: f32,
    /// Strongest lines kept for clustering
    pub max_lines: usize,
    pub canny_low: f32,
    pub canny_high: f32,
    /// Width of the angle clusters, in degrees
    pub cluster_width: f32,
}

impl Default for SkewConfig {
    fn default() -> Self {
        Self {
            max_angle: 15.0,
            angle_step: 0.1,
            min_lines: 3,
            vote_fraction: 0.25,
            max_lines: 20,
            canny_low: 50.0,
            canny_high: 150.0,
            cluster_width: 0.5,
        }
    }
}

/// A detected straight line
#[derive(Debug, Clone, Copy, PartialEq)]
struct Line {
    /// Direction in degrees, positive when the line falls to the right
    angle: f32,
    votes: u32,
}

#[derive(Debug, Clone, Default)]
pub struct SkewEstimator {
    config: SkewConfig,
}

impl SkewEstimator {
    pub fn new(config: SkewConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SkewConfig {
        &self.config
    }

    /// Estimate the rotation, in degrees, that straightens the page.
    ///
    /// Positive values rotate clockwise. Returns 0 when fewer than
    /// `min_lines` lines are found.
    pub fn estimate(&self, image: &GrayImage) -> f32 {
        let (width, height) = image.dimensions();
        if width < MIN_DIMENSION || height < MIN_DIMENSION || self.config.max_angle <= 0.0 {
            return 0.0;
        }

        let scaled;
        let analysed = if width.max(height) > ANALYSIS_MAX_DIMENSION {
            let scale = ANALYSIS_MAX_DIMENSION as f32 / width.max(height) as f32;
            scaled = imageops::resize(
                image,
                ((width as f32 * scale).round() as u32).max(1),
                ((height as f32 * scale).round() as u32).max(1),
                FilterType::Triangle,
            );
            &scaled
        } else {
            image
        };

        let edges = canny(analysed, self.config.canny_low, self.config.canny_high);
        let lines = self.detect_lines(&edges);

        if lines.len() < self.config.min_lines {
            debug!(lines = lines.len(), "Not enough lines for skew estimate");
            return 0.0;
        }

        let direction = self.dominant_angle(&lines);
        debug!(lines = lines.len(), direction, "Estimated page skew");
        (-direction).clamp(-self.config.max_angle, self.config.max_angle)
    }

    /// Hough transform restricted to near-horizontal directions.
    ///
    /// A line with direction `a` (image y pointing down) satisfies
    /// `-x sin(a) + y cos(a) = rho`.
    fn detect_lines(&self, edges: &GrayImage) -> Vec<Line> {
        let (width, height) = edges.dimensions();
        let step = self.config.angle_step.max(0.01);
        let steps = (self.config.max_angle / step).round() as i64;
        let angles: Vec<f32> = (-steps..=steps).map(|i| i as f32 * step).collect();
        let trig: Vec<(f32, f32)> = angles
            .iter()
            .map(|a| {
                let r = a.to_radians();
                (r.sin(), r.cos())
            })
            .collect();

        let diag = ((width as f32).hypot(height as f32)).ceil() as i64;
        let rho_bins = (2 * diag + 1) as usize;
        let mut accumulator = vec![0u32; angles.len() * rho_bins];

        for (x, y, pixel) in edges.enumerate_pixels() {
            if pixel.0[0] == 0 {
                continue;
            }
            let (fx, fy) = (x as f32, y as f32);
            for (a, &(sin, cos)) in trig.iter().enumerate() {
                let rho = (-fx * sin + fy * cos).round() as i64 + diag;
                accumulator[a * rho_bins + rho as usize] += 1;
            }
        }

        let min_votes = ((self.config.vote_fraction * width as f32) as u32).max(10);
        let mut candidates: Vec<(u32, usize, i64)> = accumulator
            .iter()
            .enumerate()
            .filter(|(_, &votes)| votes >= min_votes)
            .map(|(i, &votes)| (votes, i / rho_bins, (i % rho_bins) as i64))
            .collect();
        // Strongest first; ties resolved by position so the result is stable
        candidates.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)).then(a.2.cmp(&b.2)));

        let angle_radius = (PEAK_ANGLE_RADIUS_DEG / step).round() as i64;
        let mut peaks: Vec<(usize, i64, u32)> = Vec::new();
        for (votes, a, rho) in candidates {
            if peaks.len() >= self.config.max_lines {
                break;
            }
            let suppressed = peaks.iter().any(|&(pa, prho, _)| {
                (pa as i64 - a as i64).abs() <= angle_radius && (prho - rho).abs() <= PEAK_RHO_RADIUS
            });
            if !suppressed {
                peaks.push((a, rho, votes));
            }
        }

        peaks
            .into_iter()
            .map(|(a, _, votes)| Line {
                angle: angles[a],
                votes,
            })
            .collect()
    }

    /// Vote-weighted mean angle of the most populated angle cluster
    fn dominant_angle(&self, lines: &[Line]) -> f32 {
        let width = self.config.cluster_width.max(self.config.angle_step);
        let max = self.config.max_angle;
        let bin_of = |angle: f32| ((angle + max) / width).floor() as i64;

        let bins = bin_of(max) + 1;
        let mut counts = vec![0usize; bins as usize];
        for line in lines {
            counts[bin_of(line.angle).clamp(0, bins - 1) as usize] += 1;
        }

        let center = |bin: i64| -max + (bin as f32 + 0.5) * width;
        let modal = (0..bins)
            .max_by(|&a, &b| {
                counts[a as usize]
                    .cmp(&counts[b as usize])
                    .then(center(b).abs().total_cmp(&center(a).abs()))
            })
            .unwrap_or(0);

        let (sum, weight) = lines
            .iter()
            .filter(|line| (bin_of(line.angle) - modal).abs() <= 1)
            .fold((0f64, 0f64), |(sum, weight), line| {
                (
                    sum + line.angle as f64 * line.votes as f64,
                    weight + line.votes as f64,
                )
            });

        if weight == 0.0 {
            0.0
        } else {
            (sum / weight) as f32
        }
    }
}
