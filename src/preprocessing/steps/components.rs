use crate::error::OcrError;
use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

/// Pixels darker than this count as text
const FOREGROUND_THRESHOLD: u8 = 128;

/// Remove 8-connected dark components smaller than `min_area` pixels.
///
/// Specks left over from binarization would otherwise be read as stray
/// punctuation. Removed pixels become background (255). A page without
/// any dark pixels is returned unchanged.
pub fn apply(image: &GrayImage, min_area: u32) -> Result<GrayImage, OcrError> {
    let (width, height) = image.dimensions();
    if width == 0 || height == 0 {
        return Err(OcrError::PreprocessingError("empty image".to_string()));
    }
    if min_area <= 1 {
        return Ok(image.clone());
    }

    let mask = GrayImage::from_fn(width, height, |x, y| {
        if image.get_pixel(x, y).0[0] < FOREGROUND_THRESHOLD {
            Luma([255u8])
        } else {
            Luma([0u8])
        }
    });
    let labels = connected_components(&mask, Connectivity::Eight, Luma([0u8]));

    let mut areas: Vec<u32> = Vec::new();
    for label in labels.pixels() {
        let id = label.0[0] as usize;
        if id == 0 {
            continue;
        }
        if areas.len() <= id {
            areas.resize(id + 1, 0);
        }
        areas[id] += 1;
    }

    if areas.is_empty() {
        return Ok(image.clone());
    }

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let id = labels.get_pixel(x, y).0[0] as usize;
        if id != 0 && areas[id] < min_area {
            Luma([255u8])
        } else {
            *image.get_pixel(x, y)
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_removes_specks_and_keeps_glyphs() {
        let mut img = GrayImage::from_pixel(40, 40, Luma([255]));
        // 2x2 speck
        for (x, y) in [(3, 3), (4, 3), (3, 4), (4, 4)] {
            img.put_pixel(x, y, Luma([0]));
        }
        // 10x10 glyph
        for y in 20..30 {
            for x in 20..30 {
                img.put_pixel(x, y, Luma([0]));
            }
        }

        let result = apply(&img, 50).unwrap();

        assert_eq!(result.get_pixel(3, 3).0[0], 255);
        assert_eq!(result.get_pixel(25, 25).0[0], 0);
    }

    #[test]
    fn test_diagonal_pixels_form_one_component() {
        let mut img = GrayImage::from_pixel(20, 20, Luma([255]));
        for i in 0..6 {
            img.put_pixel(i + 5, i + 5, Luma([0]));
        }

        // Six diagonal pixels are one 8-connected component of area 6
        let kept = apply(&img, 6).unwrap();
        assert_eq!(kept.get_pixel(7, 7).0[0], 0);

        let removed = apply(&img, 7).unwrap();
        assert!(removed.pixels().all(|p| p.0[0] == 255));
    }

    #[test]
    fn test_blank_page_is_unchanged() {
        let img = GrayImage::from_pixel(30, 30, Luma([255]));
        assert_eq!(apply(&img, 50).unwrap(), img);
    }
}
