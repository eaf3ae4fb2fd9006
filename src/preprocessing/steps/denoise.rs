use crate::error::OcrError;
use image::{GrayImage, Luma};

/// Non-local means parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DenoiseParams {
    /// Filter strength; larger values remove more noise and more detail
    pub strength: f32,
    /// Comparison patch is (2r+1)x(2r+1)
    pub patch_radius: u32,
    /// Search window is (2r+1)x(2r+1)
    pub search_radius: u32,
}

impl Default for DenoiseParams {
    fn default() -> Self {
        Self {
            strength: 10.0,
            patch_radius: 3,
            search_radius: 5,
        }
    }
}

/// Weights below this are dropped
const MIN_WEIGHT: f32 = 1e-4;

/// Largest patch radius whose squared-difference total fits in u32
const MAX_PATCH_RADIUS: u32 = 128;

/// Apply non-local means denoising.
///
/// Each pixel becomes a weighted mean of the pixels in its search window,
/// weighted by how similar their surrounding patches are. Character strokes
/// resemble other stroke patches, so edges survive while compression and
/// scan noise averages out.
///
/// Patch distances are computed per offset with an integral image, so the
/// cost is O(pixels x search window) independent of the patch size.
pub fn apply(image: &GrayImage, params: &DenoiseParams) -> Result<GrayImage, OcrError> {
    let (width, height) = image.dimensions();
    let patch = params.patch_radius as usize;
    let search = params.search_radius as usize;

    if !params.strength.is_finite() || params.strength <= 0.0 {
        return Err(OcrError::PreprocessingError(format!(
            "invalid denoise strength {}",
            params.strength
        )));
    }
    if params.patch_radius > MAX_PATCH_RADIUS {
        return Err(OcrError::PreprocessingError(format!(
            "denoise patch radius {} exceeds {}",
            params.patch_radius, MAX_PATCH_RADIUS
        )));
    }
    if (width as usize) <= 2 * patch || (height as usize) <= 2 * patch {
        return Err(OcrError::PreprocessingError(format!(
            "image {}x{} smaller than denoise patch",
            width, height
        )));
    }

    let (w, h) = (width as usize, height as usize);
    let pad = patch + search;
    let padded_width = w + 2 * pad;
    let padded = pad_replicate(image, pad);

    // Region of patch centers widened by the patch radius
    let region_width = w + 2 * patch;
    let region_height = h + 2 * patch;
    let stride = region_width + 1;
    // Wrapping sums: a patch total always fits in u32, so corner differences
    // are exact even after the running total overflows
    let mut integral = vec![0u32; stride * (region_height + 1)];

    let lut = weight_lut(params.strength);
    let patch_area = ((2 * patch + 1) * (2 * patch + 1)) as f32;
    let mut weight_sum = vec![0f32; w * h];
    let mut value_sum = vec![0f32; w * h];

    let search = search as isize;
    for dy in -search..=search {
        for dx in -search..=search {
            let offset = dy * padded_width as isize + dx;

            for ry in 0..region_height {
                let mut row_sum = 0u32;
                let row = (ry + search as usize) * padded_width + search as usize;
                for rx in 0..region_width {
                    let idx = row + rx;
                    let diff =
                        padded[idx] as i32 - padded[(idx as isize + offset) as usize] as i32;
                    row_sum = row_sum.wrapping_add(diff.unsigned_abs().pow(2));
                    integral[(ry + 1) * stride + rx + 1] =
                        integral[ry * stride + rx + 1].wrapping_add(row_sum);
                }
            }

            for y in 0..h {
                for x in 0..w {
                    let (x0, y0) = (x, y);
                    let (x1, y1) = (x + 2 * patch + 1, y + 2 * patch + 1);
                    let ssd = integral[y1 * stride + x1]
                        .wrapping_sub(integral[y0 * stride + x1])
                        .wrapping_sub(integral[y1 * stride + x0])
                        .wrapping_add(integral[y0 * stride + x0]);
                    let distance = (ssd as f32 / patch_area).round() as usize;
                    let Some(&weight) = lut.get(distance) else {
                        continue;
                    };

                    let center = (y + pad) * padded_width + x + pad;
                    let neighbour = padded[(center as isize + offset) as usize] as f32;
                    weight_sum[y * w + x] += weight;
                    value_sum[y * w + x] += weight * neighbour;
                }
            }
        }
    }

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let i = y as usize * w + x as usize;
        // The zero offset always contributes weight 1, so the sum is positive
        let value = value_sum[i] / weight_sum[i];
        Luma([value.round().clamp(0.0, 255.0) as u8])
    }))
}

/// Copy the image into a buffer with `pad` replicated border pixels
fn pad_replicate(image: &GrayImage, pad: usize) -> Vec<u8> {
    let (w, h) = (image.width() as usize, image.height() as usize);
    let padded_width = w + 2 * pad;
    let padded_height = h + 2 * pad;
    let mut padded = Vec::with_capacity(padded_width * padded_height);
    for py in 0..padded_height {
        let y = py.saturating_sub(pad).min(h - 1) as u32;
        for px in 0..padded_width {
            let x = px.saturating_sub(pad).min(w - 1) as u32;
            padded.push(image.get_pixel(x, y).0[0]);
        }
    }
    padded
}

/// Weight by integer mean squared patch distance: exp(-d / h^2)
fn weight_lut(strength: f32) -> Vec<f32> {
    let h2 = strength * strength;
    let len = (h2 * -MIN_WEIGHT.ln()).ceil() as usize + 1;
    (0..len).map(|d| (-(d as f32) / h2).exp()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_denoise_reduces_salt_pepper_noise() {
        let mut img = GrayImage::from_pixel(20, 20, Luma([128]));
        img.put_pixel(5, 5, Luma([100])); // "pepper" noise
        img.put_pixel(12, 9, Luma([156])); // "salt" noise

        let result = apply(&img, &DenoiseParams::default()).unwrap();

        let original_variance = calculate_variance(&img);
        let result_variance = calculate_variance(&result);
        assert!(result_variance < original_variance);
    }

    #[test]
    fn test_denoise_keeps_flat_image() {
        let img = GrayImage::from_pixel(16, 16, Luma([90]));
        let result = apply(&img, &DenoiseParams::default()).unwrap();
        assert!(result.pixels().all(|p| p.0[0] == 90));
    }

    #[test]
    fn test_denoise_preserves_strong_edge() {
        let img = GrayImage::from_fn(30, 20, |x, _| if x < 15 { Luma([30]) } else { Luma([220]) });
        let result = apply(&img, &DenoiseParams::default()).unwrap();

        // Patches across the edge are far apart, so the edge stays sharp
        assert!(result.get_pixel(13, 10).0[0] < 60);
        assert!(result.get_pixel(16, 10).0[0] > 190);
    }

    #[test]
    fn test_denoise_skips_tiny_image() {
        let img = GrayImage::from_pixel(5, 5, Luma([0]));
        assert!(apply(&img, &DenoiseParams::default()).is_err());
    }

    #[test]
    fn test_denoise_is_exact_when_patch_sums_overflow() {
        // Every odd offset differs by 255 at every pixel, so the running
        // squared-difference totals pass u32::MAX on this size
        let img = GrayImage::from_fn(280, 280, |x, y| {
            if (x + y) % 2 == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let result = apply(&img, &DenoiseParams::default()).unwrap();

        for y in 10..270 {
            for x in 10..270 {
                assert_eq!(result.get_pixel(x, y), img.get_pixel(x, y), "at {},{}", x, y);
            }
        }
    }

    #[test]
    fn test_denoise_rejects_oversized_patch() {
        let img = GrayImage::from_pixel(600, 600, Luma([0]));
        let params = DenoiseParams {
            patch_radius: 200,
            ..DenoiseParams::default()
        };
        assert!(apply(&img, &params).is_err());
    }

    fn calculate_variance(img: &GrayImage) -> f64 {
        let pixels: Vec<f64> = img.pixels().map(|p| p.0[0] as f64).collect();
        let mean = pixels.iter().sum::<f64>() / pixels.len() as f64;
        pixels.iter().map(|p| (p - mean).powi(2)).sum::<f64>() / pixels.len() as f64
    }
}
