use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OcrError {
    #[error("Failed to initialize OCR engine: {0}")]
    InitializationError(String),

    #[error("Failed to process image: {0}")]
    ProcessingError(String),

    /// A preprocessing stage could not run; the pipeline keeps the prior image.
    #[error("Preprocessing failed: {0}")]
    PreprocessingError(String),

    #[error("Invalid OCR profile '{0}'")]
    InvalidProfile(String),

    #[error("OCR attempt with profile {profile} failed: {reason}")]
    AttemptFailed { profile: String, reason: String },

    #[error("OCR attempt with profile {profile} timed out after {timeout_ms}ms")]
    AttemptTimedOut { profile: String, timeout_ms: u64 },

    /// The engine recognized some text before failing.
    #[error("Recognition incomplete: {reason}")]
    PartialOutput { text: String, reason: String },

    #[error("All {attempts} OCR attempts failed")]
    AllAttemptsFailed { attempts: usize },

    #[error("OCR failed for page {page}: {reason}")]
    PageOcrFailed { page: usize, reason: String },

    #[error("Worker crashed while processing page {page}: {reason}")]
    WorkerCrash { page: usize, reason: String },

    #[error("No input pages to process")]
    NoInputPages,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Failed to write output: {0}")]
    Output(String),

    #[error("Checkpoint error: {0}")]
    Checkpoint(String),
}

impl OcrError {
    /// Stable identifier used in logs and in failed page records
    pub fn code(&self) -> &'static str {
        match self {
            OcrError::InitializationError(_) => "INIT_ERROR",
            OcrError::ProcessingError(_) => "PROCESSING_ERROR",
            OcrError::PreprocessingError(_) => "PREPROCESSING_STAGE_SKIPPED",
            OcrError::InvalidProfile(_) => "INVALID_PROFILE",
            OcrError::AttemptFailed { .. } => "OCR_ATTEMPT_FAILED",
            OcrError::AttemptTimedOut { .. } => "OCR_ATTEMPT_TIMEOUT",
            OcrError::PartialOutput { .. } => "PARTIAL_OUTPUT",
            OcrError::AllAttemptsFailed { .. } => "ALL_ATTEMPTS_FAILED",
            OcrError::PageOcrFailed { .. } => "PAGE_OCR_FAILED",
            OcrError::WorkerCrash { .. } => "WORKER_CRASH",
            OcrError::NoInputPages => "NO_INPUT_PAGES",
            OcrError::InvalidInput(_) => "INVALID_INPUT",
            OcrError::Output(_) => "OUTPUT_ERROR",
            OcrError::Checkpoint(_) => "CHECKPOINT_ERROR",
        }
    }
}

/// Failure marker attached to a page that could not be recognized
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageFailure {
    pub code: String,
    pub error: String,
}

impl From<&OcrError> for PageFailure {
    fn from(err: &OcrError) -> Self {
        Self {
            code: err.code().to_string(),
            error: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_failure_carries_code_and_message() {
        let err = OcrError::PageOcrFailed {
            page: 3,
            reason: "engine unavailable".to_string(),
        };
        let failure = PageFailure::from(&err);
        assert_eq!(failure.code, "PAGE_OCR_FAILED");
        assert_eq!(failure.error, "OCR failed for page 3: engine unavailable");
    }

    #[test]
    fn test_worker_crash_maps_to_its_own_code() {
        let err = OcrError::WorkerCrash {
            page: 1,
            reason: "panic".to_string(),
        };
        assert_eq!(err.code(), "WORKER_CRASH");
    }
}
