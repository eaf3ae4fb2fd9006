use crate::error::OcrError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

use super::transcript::PageResult;

/// Finalized pages of an unfinished run, stored as JSON
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    pub total_pages: usize,
    pub pages: Vec<PageResult>,
}

impl Checkpoint {
    pub fn new(total_pages: usize, pages: Vec<PageResult>) -> Self {
        Self { total_pages, pages }
    }

    pub fn load(path: &Path) -> Result<Self, OcrError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            OcrError::Checkpoint(format!("Failed to read {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&data).map_err(|e| {
            OcrError::Checkpoint(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Load the checkpoint if the file exists
    pub fn load_if_exists(path: &Path) -> Result<Option<Self>, OcrError> {
        if path.exists() {
            Self::load(path).map(Some)
        } else {
            Ok(None)
        }
    }

    /// Write to a sibling temporary file, then rename over `path`, so a crash
    /// mid-write never leaves a truncated checkpoint behind.
    pub fn save(&self, path: &Path) -> Result<(), OcrError> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| OcrError::Checkpoint(format!("Failed to serialize: {}", e)))?;

        let tmp = temp_path(path);
        std::fs::write(&tmp, json).map_err(|e| {
            OcrError::Checkpoint(format!("Failed to write {}: {}", tmp.display(), e))
        })?;
        std::fs::rename(&tmp, path).map_err(|e| {
            OcrError::Checkpoint(format!("Failed to replace {}: {}", path.display(), e))
        })?;

        debug!(
            path = %path.display(),
            pages = self.pages.len(),
            total = self.total_pages,
            "Checkpoint written"
        );
        Ok(())
    }

    /// Remove the checkpoint after a complete run
    pub fn remove(path: &Path) -> Result<(), OcrError> {
        match std::fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(OcrError::Checkpoint(format!(
                "Failed to remove {}: {}",
                path.display(),
                e
            ))),
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PageFailure;

    #[test]
    fn test_checkpoint_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("book.checkpoint.json");
        let checkpoint = Checkpoint::new(
            4,
            vec![
                PageResult {
                    page_index: 1,
                    text: "第一章".to_string(),
                    confidence: 88.5,
                    used_fallback: false,
                    profile: Some("6:jpn:3".to_string()),
                    failure: None,
                },
                PageResult {
                    page_index: 2,
                    text: String::new(),
                    confidence: 0.0,
                    used_fallback: false,
                    profile: None,
                    failure: Some(PageFailure {
                        code: "PAGE_OCR_FAILED".to_string(),
                        error: "no text".to_string(),
                    }),
                },
            ],
        );

        checkpoint.save(&path).unwrap();

        assert_eq!(Checkpoint::load(&path).unwrap(), checkpoint);
        assert!(!temp_path(&path).exists());
    }

    #[test]
    fn test_missing_checkpoint_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.json");
        assert!(Checkpoint::load_if_exists(&path).unwrap().is_none());
        assert!(Checkpoint::remove(&path).is_ok());
    }

    #[test]
    fn test_corrupt_checkpoint_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, "{not json").unwrap();
        let err = Checkpoint::load(&path).unwrap_err();
        assert_eq!(err.code(), "CHECKPOINT_ERROR");
    }
}
