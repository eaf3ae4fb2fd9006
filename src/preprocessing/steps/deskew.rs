use crate::error::OcrError;
use crate::preprocessing::skew::SkewEstimator;
use image::{GrayImage, Luma};
use imageproc::geometric_transformations::{warp_with, Interpolation};
use tracing::debug;

/// Rotations smaller than this (degrees) are not worth resampling for
const MIN_CORRECTION: f32 = 0.1;

/// Straighten the page using the estimated skew.
///
/// Returns the corrected image and the applied rotation in degrees
/// (0 when the page was left untouched).
pub fn apply(image: &GrayImage, estimator: &SkewEstimator) -> Result<(GrayImage, f32), OcrError> {
    let (width, height) = image.dimensions();
    if width < 2 || height < 2 {
        return Err(OcrError::PreprocessingError(format!(
            "image {}x{} too small to deskew",
            width, height
        )));
    }

    let angle = estimator.estimate(image);
    if angle.abs() < MIN_CORRECTION {
        return Ok((image.clone(), 0.0));
    }

    debug!(angle, "Applying deskew rotation");
    Ok((rotate(image, angle), angle))
}

/// Rotate clockwise by `degrees` about the center.
///
/// Samples falling outside the source are clamped to the nearest border
/// pixel, so the corners take the page background instead of a fill color.
pub fn rotate(image: &GrayImage, degrees: f32) -> GrayImage {
    let (width, height) = image.dimensions();
    let (sin, cos) = degrees.to_radians().sin_cos();
    let cx = width as f32 / 2.0;
    let cy = height as f32 / 2.0;
    // Bilinear sampling needs a right/bottom neighbour inside the image
    let max_x = width as f32 - 1.001;
    let max_y = height as f32 - 1.001;

    warp_with(
        image,
        move |x, y| {
            let dx = x - cx;
            let dy = y - cy;
            let sx = cx + cos * dx + sin * dy;
            let sy = cy - sin * dx + cos * dy;
            (sx.clamp(0.0, max_x), sy.clamp(0.0, max_y))
        },
        Interpolation::Bilinear,
        Luma([255u8]),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use imageproc::geometric_transformations::rotate_about_center;

    fn ruled_page() -> GrayImage {
        let mut img = GrayImage::from_pixel(240, 200, Luma([255]));
        for row in 0..5 {
            let top = 30 + row * 32;
            for y in top..top + 5 {
                for x in 30..210 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }
        img
    }

    #[test]
    fn test_deskew_straightens_rotated_page() {
        let estimator = SkewEstimator::default();
        let skewed = rotate_about_center(
            &ruled_page(),
            4.0_f32.to_radians(),
            Interpolation::Bilinear,
            Luma([255]),
        );

        let (corrected, applied) = apply(&skewed, &estimator).unwrap();

        assert!((applied + 4.0).abs() <= 1.0, "applied {}", applied);
        let residual = estimator.estimate(&corrected);
        assert!(residual.abs() <= 1.0, "residual skew {}", residual);
    }

    #[test]
    fn test_deskew_leaves_straight_page_untouched() {
        let img = ruled_page();
        let (result, applied) = apply(&img, &SkewEstimator::default()).unwrap();
        assert_eq!(applied, 0.0);
        assert_eq!(result, img);
    }

    #[test]
    fn test_rotate_replicates_border() {
        let img = GrayImage::from_pixel(50, 40, Luma([0]));
        let result = rotate(&img, 10.0);
        assert_eq!(result.dimensions(), (50, 40));
        // Corners are filled from the border, not with white
        assert_eq!(result.get_pixel(0, 0).0[0], 0);
        assert_eq!(result.get_pixel(49, 39).0[0], 0);
    }
}
