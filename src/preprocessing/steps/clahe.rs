use crate::error::OcrError;
use image::{GrayImage, Luma};

/// Contrast-limited adaptive histogram equalization parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClaheParams {
    /// Histogram bins are clipped at `clip_limit` times the uniform bin height
    pub clip_limit: f32,
    /// The page is split into `tile_grid` x `tile_grid` tiles
    pub tile_grid: u32,
}

impl Default for ClaheParams {
    fn default() -> Self {
        Self {
            clip_limit: 3.0,
            tile_grid: 8,
        }
    }
}

/// Apply CLAHE.
///
/// Each tile gets its own equalization curve with the histogram clipped so
/// flat regions (page background) are not blown up into noise. Pixels are
/// mapped by bilinear interpolation between the curves of the four nearest
/// tile centers, which avoids visible tile seams.
pub fn apply(image: &GrayImage, params: &ClaheParams) -> Result<GrayImage, OcrError> {
    let (width, height) = image.dimensions();
    let grid = params.tile_grid;

    if grid == 0 || params.clip_limit <= 0.0 {
        return Err(OcrError::PreprocessingError(
            "invalid CLAHE parameters".to_string(),
        ));
    }
    if width < grid || height < grid {
        return Err(OcrError::PreprocessingError(format!(
            "image {}x{} smaller than CLAHE grid {}",
            width, height, grid
        )));
    }

    let luts: Vec<[u8; 256]> = (0..grid)
        .flat_map(|ty| (0..grid).map(move |tx| (tx, ty)))
        .map(|(tx, ty)| {
            let (x0, x1) = tile_bounds(tx, width, grid);
            let (y0, y1) = tile_bounds(ty, height, grid);
            tile_lut(image, x0, x1, y0, y1, params.clip_limit)
        })
        .collect();

    let tile_w = width as f32 / grid as f32;
    let tile_h = height as f32 / grid as f32;
    let last = grid as i64 - 1;

    Ok(GrayImage::from_fn(width, height, |x, y| {
        let fx = (x as f32 + 0.5) / tile_w - 0.5;
        let fy = (y as f32 + 0.5) / tile_h - 0.5;
        let (tx0f, ty0f) = (fx.floor(), fy.floor());
        let (ax, ay) = (fx - tx0f, fy - ty0f);

        let tx0 = (tx0f as i64).clamp(0, last) as usize;
        let tx1 = (tx0f as i64 + 1).clamp(0, last) as usize;
        let ty0 = (ty0f as i64).clamp(0, last) as usize;
        let ty1 = (ty0f as i64 + 1).clamp(0, last) as usize;

        let v = image.get_pixel(x, y).0[0] as usize;
        let g = grid as usize;
        let top = luts[ty0 * g + tx0][v] as f32 * (1.0 - ax) + luts[ty0 * g + tx1][v] as f32 * ax;
        let bottom =
            luts[ty1 * g + tx0][v] as f32 * (1.0 - ax) + luts[ty1 * g + tx1][v] as f32 * ax;
        let value = top * (1.0 - ay) + bottom * ay;
        Luma([value.round().clamp(0.0, 255.0) as u8])
    }))
}

/// Pixel range [start, end) covered by tile `index`
fn tile_bounds(index: u32, size: u32, grid: u32) -> (u32, u32) {
    let start = (index as u64 * size as u64 / grid as u64) as u32;
    let end = ((index as u64 + 1) * size as u64 / grid as u64) as u32;
    (start, end)
}

/// Equalization curve for one tile with a clipped, redistributed histogram
fn tile_lut(image: &GrayImage, x0: u32, x1: u32, y0: u32, y1: u32, clip_limit: f32) -> [u8; 256] {
    let mut histogram = [0u32; 256];
    for y in y0..y1 {
        for x in x0..x1 {
            histogram[image.get_pixel(x, y).0[0] as usize] += 1;
        }
    }
    let total = (x1 - x0) * (y1 - y0);

    let limit = ((clip_limit * total as f32 / 256.0) as u32).max(1);
    let mut excess = 0u32;
    for bin in histogram.iter_mut() {
        if *bin > limit {
            excess += *bin - limit;
            *bin = limit;
        }
    }

    // Spread the clipped mass evenly; the remainder goes to the lowest bins
    let share = excess / 256;
    let remainder = (excess % 256) as usize;
    for (i, bin) in histogram.iter_mut().enumerate() {
        *bin += share + u32::from(i < remainder);
    }

    let mut lut = [0u8; 256];
    let mut cdf = 0u64;
    for (value, &count) in histogram.iter().enumerate() {
        cdf += count as u64;
        lut[value] = ((cdf * 255 + total as u64 / 2) / total as u64).min(255) as u8;
    }
    lut
}
