use crate::error::OcrError;
use image::{GrayImage, Luma};

const R: f32 = 128.0; // Dynamic range / 2

/// Binarization method
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Binarization {
    /// Global threshold maximizing between-class variance
    #[default]
    Otsu,
    /// Local threshold from window mean and deviation, for uneven lighting
    Sauvola { window: u32, k: f32 },
}

impl Binarization {
    pub fn sauvola() -> Self {
        Self::Sauvola {
            window: 15,
            k: 0.2,
        }
    }
}

/// Convert to pure text (0) and background (255)
pub fn apply(image: &GrayImage, method: &Binarization) -> Result<GrayImage, OcrError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::PreprocessingError("empty image".to_string()));
    }

    match *method {
        Binarization::Otsu => {
            let threshold = otsu_threshold(image).ok_or_else(|| {
                OcrError::PreprocessingError("degenerate histogram".to_string())
            })?;
            Ok(GrayImage::from_fn(width, height, |x, y| {
                if image.get_pixel(x, y).0[0] > threshold {
                    Luma([255u8])
                } else {
                    Luma([0u8])
                }
            }))
        }
        Binarization::Sauvola { window, k } => {
            if window < 3 {
                return Err(OcrError::PreprocessingError(format!(
                    "Sauvola window {} too small",
                    window
                )));
            }
            Ok(sauvola_threshold(image, window, k))
        }
    }
}

/// Otsu's threshold; pixels at or below it are text.
/// `None` when the image holds a single intensity.
fn otsu_threshold(gray: &GrayImage) -> Option<u8> {
    let mut histogram = [0u64; 256];
    for pixel in gray.pixels() {
        histogram[pixel.0[0] as usize] += 1;
    }

    let total_pixels = gray.width() as u64 * gray.height() as u64;
    if histogram.iter().filter(|&&count| count > 0).count() < 2 {
        return None;
    }

    let sum_total: f64 = histogram
        .iter()
        .enumerate()
        .map(|(i, &count)| i as f64 * count as f64)
        .sum();

    let mut sum_background = 0f64;
    let mut weight_background = 0u64;
    let mut max_variance = 0f64;
    let mut best_threshold = 0u8;

    for (t, &count) in histogram.iter().enumerate() {
        weight_background += count;
        if weight_background == 0 {
            continue;
        }
        let weight_foreground = total_pixels - weight_background;
        if weight_foreground == 0 {
            break;
        }

        sum_background += t as f64 * count as f64;
        let mean_background = sum_background / weight_background as f64;
        let mean_foreground = (sum_total - sum_background) / weight_foreground as f64;

        let between_variance = weight_background as f64
            * weight_foreground as f64
            * (mean_background - mean_foreground).powi(2);

        if between_variance > max_variance {
            max_variance = between_variance;
            best_threshold = t as u8;
        }
    }

    Some(best_threshold)
}

/// Sauvola adaptive thresholding
///
/// For each pixel, threshold = mean * (1 + k * (std_dev / R - 1))
/// where R is max standard deviation (128 for 8-bit images)
fn sauvola_threshold(img: &GrayImage, window_size: u32, k: f32) -> GrayImage {
    let (width, height) = img.dimensions();
    let half_window = window_size as i32 / 2;

    // Precompute integral images for efficient window statistics
    let (integral, integral_sq) = compute_integral_images(img);

    GrayImage::from_fn(width, height, |x, y| {
        let x1 = (x as i32 - half_window).max(0) as u32;
        let y1 = (y as i32 - half_window).max(0) as u32;
        let x2 = (x as i32 + half_window).min(width as i32 - 1) as u32;
        let y2 = (y as i32 + half_window).min(height as i32 - 1) as u32;

        let (mean, std_dev) = window_stats(&integral, &integral_sq, x1, y1, x2, y2);

        let threshold = mean * (1.0 + k * (std_dev / R - 1.0));

        let pixel = img.get_pixel(x, y).0[0] as f32;
        if pixel > threshold {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    })
}

/// Compute integral image and integral of squared values
fn compute_integral_images(img: &GrayImage) -> (Vec<Vec<f64>>, Vec<Vec<f64>>) {
    let (width, height) = img.dimensions();
    let mut integral = vec![vec![0.0f64; width as usize + 1]; height as usize + 1];
    let mut integral_sq = vec![vec![0.0f64; width as usize + 1]; height as usize + 1];

    for y in 0..height as usize {
        for x in 0..width as usize {
            let val = img.get_pixel(x as u32, y as u32).0[0] as f64;
            integral[y + 1][x + 1] =
                val + integral[y][x + 1] + integral[y + 1][x] - integral[y][x];
            integral_sq[y + 1][x + 1] =
                val * val + integral_sq[y][x + 1] + integral_sq[y + 1][x] - integral_sq[y][x];
        }
    }

    (integral, integral_sq)
}

/// Compute mean and standard deviation for a window using integral images
fn window_stats(
    integral: &[Vec<f64>],
    integral_sq: &[Vec<f64>],
    x1: u32,
    y1: u32,
    x2: u32,
    y2: u32,
) -> (f32, f32) {
    let (x1, y1, x2, y2) = (x1 as usize, y1 as usize, x2 as usize + 1, y2 as usize + 1);
    let area = ((x2 - x1) * (y2 - y1)) as f64;

    let sum = integral[y2][x2] - integral[y1][x2] - integral[y2][x1] + integral[y1][x1];
    let sum_sq =
        integral_sq[y2][x2] - integral_sq[y1][x2] - integral_sq[y2][x1] + integral_sq[y1][x1];

    let mean = sum / area;
    let variance = (sum_sq / area) - (mean * mean);
    let std_dev = variance.max(0.0).sqrt();

    (mean as f32, std_dev as f32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_binary(img: &GrayImage) -> bool {
        img.pixels().all(|p| p.0[0] == 0 || p.0[0] == 255)
    }

    #[test]
    fn test_otsu_binarizes_image() {
        let img = GrayImage::from_fn(50, 50, |x, _| Luma([(x as u8 * 5).min(255)]));
        let result = apply(&img, &Binarization::Otsu).unwrap();
        assert!(is_binary(&result));
    }

    #[test]
    fn test_otsu_separates_text_from_background() {
        let mut img = GrayImage::from_pixel(50, 20, Luma([230]));
        for x in 10..40 {
            img.put_pixel(x, 10, Luma([40]));
        }

        let result = apply(&img, &Binarization::Otsu).unwrap();

        assert_eq!(result.get_pixel(25, 10).0[0], 0);
        assert_eq!(result.get_pixel(25, 5).0[0], 255);
    }

    #[test]
    fn test_otsu_rejects_single_intensity() {
        let img = GrayImage::from_pixel(30, 30, Luma([255]));
        assert!(apply(&img, &Binarization::Otsu).is_err());
    }

    #[test]
    fn test_sauvola_handles_text_pattern() {
        // Create dark text on light background
        let mut img = GrayImage::from_pixel(50, 20, Luma([240]));
        for x in 10..40 {
            img.put_pixel(x, 10, Luma([20])); // dark text
        }

        let result = apply(&img, &Binarization::sauvola()).unwrap();

        assert!(is_binary(&result));
        // Text pixels should be black (0)
        assert_eq!(result.get_pixel(25, 10).0[0], 0);
        // Background should be white (255)
        assert_eq!(result.get_pixel(25, 5).0[0], 255);
    }
}
