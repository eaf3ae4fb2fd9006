use crate::error::{OcrError, PageFailure};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Final outcome for one page. Exactly one is produced per page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// 1-based position in the book
    pub page_index: usize,
    pub text: String,
    /// Score of the chosen attempt, 0-100
    pub confidence: f32,
    /// Text came from the fallback profiles or from a failed attempt's partial output
    pub used_fallback: bool,
    /// Profile that produced the text, in `PSM:LANG:OEM` form
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Set when no attempt succeeded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<PageFailure>,
}

impl PageResult {
    /// Empty result for a page that could not be recognized
    pub fn failed(page_index: usize, error: &OcrError) -> Self {
        Self {
            page_index,
            text: String::new(),
            confidence: 0.0,
            used_fallback: false,
            profile: None,
            failure: Some(PageFailure::from(error)),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.failure.is_some()
    }
}

/// Counts reported at the end of a run
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct TranscriptSummary {
    pub expected_pages: usize,
    pub completed_pages: usize,
    pub recognized: usize,
    pub recovered_by_fallback: usize,
    pub failed: usize,
    pub mean_confidence: f32,
}

/// Page results of a book in page order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookTranscript {
    pages: Vec<PageResult>,
    expected_pages: usize,
}

impl BookTranscript {
    /// Order results by page index. If a page shows up twice the first
    /// result is kept; a finalized page is never replaced.
    pub fn assemble(results: impl IntoIterator<Item = PageResult>, expected_pages: usize) -> Self {
        let mut by_index: BTreeMap<usize, PageResult> = BTreeMap::new();
        for result in results {
            by_index.entry(result.page_index).or_insert(result);
        }
        Self {
            pages: by_index.into_values().collect(),
            expected_pages,
        }
    }

    pub fn pages(&self) -> &[PageResult] {
        &self.pages
    }

    pub fn into_pages(self) -> Vec<PageResult> {
        self.pages
    }

    pub fn expected_pages(&self) -> usize {
        self.expected_pages
    }

    pub fn get(&self, page_index: usize) -> Option<&PageResult> {
        self.pages
            .binary_search_by_key(&page_index, |p| p.page_index)
            .ok()
            .map(|i| &self.pages[i])
    }

    /// Every page 1..=N has a result
    pub fn is_complete(&self) -> bool {
        self.pages.len() == self.expected_pages
            && self
                .pages
                .iter()
                .enumerate()
                .all(|(i, p)| p.page_index == i + 1)
    }

    /// Page indexes in 1..=N without a result
    pub fn missing_pages(&self) -> Vec<usize> {
        (1..=self.expected_pages)
            .filter(|i| self.get(*i).is_none())
            .collect()
    }

    pub fn summary(&self) -> TranscriptSummary {
        let failed = self.pages.iter().filter(|p| p.is_failed()).count();
        let recovered_by_fallback = self
            .pages
            .iter()
            .filter(|p| p.used_fallback && !p.text.is_empty())
            .count();
        let mean_confidence = if self.pages.is_empty() {
            0.0
        } else {
            self.pages.iter().map(|p| p.confidence).sum::<f32>() / self.pages.len() as f32
        };
        TranscriptSummary {
            expected_pages: self.expected_pages,
            completed_pages: self.pages.len(),
            recognized: self.pages.len() - failed,
            recovered_by_fallback,
            failed,
            mean_confidence,
        }
    }

    /// Page texts in order, joined by `separator`
    pub fn render(&self, separator: &str) -> String {
        self.pages
            .iter()
            .map(|p| p.text.as_str())
            .collect::<Vec<_>>()
            .join(separator)
    }

    /// Write the rendered transcript as UTF-8, creating parent directories
    pub fn write_to(&self, path: &Path, separator: &str) -> Result<(), OcrError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                OcrError::Output(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }
        std::fs::write(path, self.render(separator))
            .map_err(|e| OcrError::Output(format!("Failed to write {}: {}", path.display(), e)))
    }
}

/// `<dir>/<stem>_partial.txt` next to the requested output
pub fn partial_output_path(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "transcript".to_string());
    output.with_file_name(format!("{}_partial.txt", stem))
}
