use crate::error::OcrError;
use image::DynamicImage;
use std::path::{Path, PathBuf};

/// File extensions recognized as page images
const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tiff", "tif", "webp"];

/// Where a page's pixels come from
#[derive(Debug, Clone)]
pub enum PageSource {
    Path(PathBuf),
    Image(DynamicImage),
}

/// One raw page of the book, owned by the worker that processes it
#[derive(Debug, Clone)]
pub struct RawPage {
    /// 1-based position in the book
    pub index: usize,
    pub source: PageSource,
}

impl RawPage {
    pub fn from_path(index: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            index,
            source: PageSource::Path(path.into()),
        }
    }

    pub fn from_image(index: usize, image: DynamicImage) -> Self {
        Self {
            index,
            source: PageSource::Image(image),
        }
    }

    /// Decode the page, consuming it
    pub fn into_image(self) -> Result<DynamicImage, OcrError> {
        match self.source {
            PageSource::Image(image) => Ok(image),
            PageSource::Path(path) => image::open(&path).map_err(|e| {
                OcrError::ProcessingError(format!("Failed to load {}: {}", path.display(), e))
            }),
        }
    }
}

/// Number a list of images 1..=N in the given order
pub fn pages_from_images(images: impl IntoIterator<Item = DynamicImage>) -> Vec<RawPage> {
    images
        .into_iter()
        .enumerate()
        .map(|(i, image)| RawPage::from_image(i + 1, image))
        .collect()
}

/// Page images in `dir`, sorted by file name and numbered 1..=N
pub fn discover_pages(dir: &Path) -> Result<Vec<RawPage>, OcrError> {
    let entries = std::fs::read_dir(dir).map_err(|e| {
        OcrError::InvalidInput(format!("Cannot read input directory {}: {}", dir.display(), e))
    })?;

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry
            .map_err(|e| OcrError::InvalidInput(format!("Cannot list {}: {}", dir.display(), e)))?
            .path();
        if path.is_file() && is_page_image(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    Ok(paths
        .into_iter()
        .enumerate()
        .map(|(i, path)| RawPage::from_path(i + 1, path))
        .collect())
}

fn is_page_image(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}
