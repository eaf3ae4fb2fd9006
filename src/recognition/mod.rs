//! Multi-profile recognition
//!
//! Every page is recognized once per configured profile. Each attempt is an
//! immutable [`OcrAttemptResult`]; the selector reduces them to one result.

pub mod runner;
pub mod selector;

pub use runner::AttemptRunner;
pub use selector::{best_partial, score, select, Selection};

use crate::profile::OcrProfile;
use serde::{Deserialize, Serialize};

/// How an attempt ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Success,
    /// Engine error, panic or timeout; the string carries the error code and message
    Failed(String),
}

/// Output of running the engine with one profile on one page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OcrAttemptResult {
    /// Position of the profile in the configured order; lower wins ties
    pub profile_index: usize,
    pub profile: OcrProfile,
    /// Recognized text; failed attempts may carry partial output
    pub text: String,
    /// Attempt score, 0-100
    pub confidence: f32,
    pub outcome: AttemptOutcome,
}

impl OcrAttemptResult {
    pub fn succeeded(&self) -> bool {
        self.outcome == AttemptOutcome::Success
    }

    pub fn failure_reason(&self) -> Option<&str> {
        match &self.outcome {
            AttemptOutcome::Success => None,
            AttemptOutcome::Failed(reason) => Some(reason),
        }
    }
}
