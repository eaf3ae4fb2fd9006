use crate::error::OcrError;
use image::GrayImage;
use imageproc::morphology::{grayscale_open, Mask};

/// Close small gaps in dark glyph strokes.
///
/// Closing the dark foreground with a (2r+1)x(2r+1) square is a grayscale
/// opening of the page: erosion grows the strokes over hairline gaps, then
/// dilation shrinks them back to their original width. A radius of 0 leaves
/// the image unchanged.
pub fn apply(image: &GrayImage, radius: u32) -> Result<GrayImage, OcrError> {
    let (width, height) = image.dimensions();
    if radius == 0 {
        return Ok(image.clone());
    }
    let mask_radius = u8::try_from(radius).map_err(|_| {
        OcrError::PreprocessingError(format!("morphology radius {} too large", radius))
    })?;
    if width <= 2 * radius || height <= 2 * radius {
        return Err(OcrError::PreprocessingError(format!(
            "image {}x{} smaller than morphology kernel",
            width, height
        )));
    }

    Ok(grayscale_open(image, &Mask::square(mask_radius)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    #[test]
    fn test_morphology_closes_gap_in_stroke() {
        // Horizontal stroke with a one-pixel break
        let mut img = GrayImage::from_pixel(20, 9, Luma([255]));
        for x in 3..17 {
            if x != 10 {
                for y in 3..6 {
                    img.put_pixel(x, y, Luma([0]));
                }
            }
        }

        let result = apply(&img, 1).unwrap();

        assert_eq!(result.get_pixel(10, 4).0[0], 0);
        // Background away from the stroke is untouched
        assert_eq!(result.get_pixel(10, 0).0[0], 255);
    }

    #[test]
    fn test_morphology_keeps_stroke_width() {
        let img = GrayImage::from_fn(20, 20, |x, _| {
            if (8..12).contains(&x) {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let result = apply(&img, 1).unwrap();
        assert_eq!(result, img);
    }

    #[test]
    fn test_oversized_radius_is_rejected() {
        let img = GrayImage::from_pixel(10, 10, Luma([255]));
        assert!(apply(&img, 300).is_err());
        assert!(apply(&img, 5).is_err());
    }

    #[test]
    fn test_zero_radius_is_identity() {
        let img = GrayImage::from_fn(10, 10, |x, y| Luma([(x * y) as u8]));
        assert_eq!(apply(&img, 0).unwrap(), img);
    }
}
