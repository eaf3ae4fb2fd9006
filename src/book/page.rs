//! Per-page orchestration
//!
//! A page moves through explicit states:
//! `Pending -> Preprocessing -> Recognizing -> Selecting -> Done`, or ends in
//! `Failed`. When the primary profiles find no text, `Selecting` sends the
//! page back to `Recognizing` once with the fallback profiles.

use crate::config::PipelineConfig;
use crate::error::OcrError;
use crate::preprocessing::Preprocessor;
use crate::profile::OcrProfile;
use crate::recognition::{best_partial, select, AttemptRunner, OcrAttemptResult, Selection};
use image::{DynamicImage, GrayImage};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn, Instrument};

use super::input::RawPage;
use super::transcript::PageResult;

/// Which profile set a recognition pass uses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pass {
    Primary,
    Fallback,
}

/// Processing state of one page. Each state owns the data it needs.
#[derive(Debug)]
pub enum PageState {
    Pending(RawPage),
    Preprocessing(DynamicImage),
    Recognizing {
        image: Arc<GrayImage>,
        pass: Pass,
        attempts: Vec<OcrAttemptResult>,
    },
    Selecting {
        image: Arc<GrayImage>,
        pass: Pass,
        attempts: Vec<OcrAttemptResult>,
    },
    Done(PageResult),
    Failed(PageResult),
}

impl PageState {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Pending(_) => "pending",
            Self::Preprocessing(_) => "preprocessing",
            Self::Recognizing { .. } => "recognizing",
            Self::Selecting { .. } => "selecting",
            Self::Done(_) => "done",
            Self::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done(_) | Self::Failed(_))
    }
}

impl fmt::Display for PageState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Runs preprocessing, recognition and selection for single pages.
/// Cheap to clone; clones share the attempt semaphore.
#[derive(Clone)]
pub struct PageProcessor {
    preprocessor: Arc<Preprocessor>,
    runner: AttemptRunner,
    profiles: Arc<[OcrProfile]>,
    fallback_profiles: Arc<[OcrProfile]>,
}

impl PageProcessor {
    pub fn new(runner: AttemptRunner, config: &PipelineConfig) -> Self {
        Self {
            preprocessor: Arc::new(Preprocessor::new(config.preprocess.clone())),
            runner,
            profiles: config.profiles.clone().into(),
            fallback_profiles: config.fallback_profiles.clone().into(),
        }
    }

    /// Drive one page to a final result. Never fails: every error ends in
    /// a `Failed` state holding an empty or partial result.
    pub async fn process(&self, page: RawPage) -> PageResult {
        let page_index = page.index;
        let span = tracing::info_span!("page", page = page_index);

        async move {
            let start = Instant::now();
            let mut state = PageState::Pending(page);
            while !state.is_terminal() {
                let from = state.name();
                state = self.advance(page_index, state).await;
                debug!(from, to = state.name(), "Page state transition");
            }
            let elapsed_ms = start.elapsed().as_millis() as u64;

            match state {
                PageState::Done(result) => {
                    info!(
                        confidence = result.confidence,
                        profile = result.profile.as_deref().unwrap_or("-"),
                        used_fallback = result.used_fallback,
                        chars = result.text.chars().count(),
                        elapsed_ms,
                        "Page finalized"
                    );
                    result
                }
                PageState::Failed(result) => {
                    warn!(
                        code = result.failure.as_ref().map(|f| f.code.as_str()).unwrap_or("-"),
                        error = result.failure.as_ref().map(|f| f.error.as_str()).unwrap_or("-"),
                        partial_chars = result.text.chars().count(),
                        elapsed_ms,
                        "Page failed"
                    );
                    result
                }
                // The loop only exits on a terminal state
                other => PageResult::failed(
                    page_index,
                    &OcrError::PageOcrFailed {
                        page: page_index,
                        reason: format!("stopped in state {}", other),
                    },
                ),
            }
        }
        .instrument(span)
        .await
    }

    /// Perform one state transition
    pub async fn advance(&self, page_index: usize, state: PageState) -> PageState {
        match state {
            PageState::Pending(page) => {
                match tokio::task::spawn_blocking(move || page.into_image()).await {
                    Ok(Ok(image)) => PageState::Preprocessing(image),
                    Ok(Err(e)) => PageState::Failed(PageResult::failed(
                        page_index,
                        &OcrError::PageOcrFailed {
                            page: page_index,
                            reason: e.to_string(),
                        },
                    )),
                    Err(e) => crashed(page_index, e),
                }
            }

            PageState::Preprocessing(raw) => {
                let preprocessor = Arc::clone(&self.preprocessor);
                // The raw image is dropped inside the task once preprocessed
                match tokio::task::spawn_blocking(move || preprocessor.process(&raw)).await {
                    Ok(result) => {
                        debug!(
                            total_ms = result.total_time_ms,
                            skew_angle = result.skew_angle,
                            skipped = result.skipped_steps().count(),
                            "Preprocessing finished"
                        );
                        PageState::Recognizing {
                            image: Arc::new(result.image),
                            pass: Pass::Primary,
                            attempts: Vec::new(),
                        }
                    }
                    Err(e) => crashed(page_index, e),
                }
            }

            PageState::Recognizing {
                image,
                pass,
                mut attempts,
            } => {
                let (profiles, offset) = match pass {
                    Pass::Primary => (&self.profiles, 0),
                    Pass::Fallback => (&self.fallback_profiles, self.profiles.len()),
                };
                attempts.extend(self.runner.run_all(&image, profiles, offset).await);
                PageState::Selecting {
                    image,
                    pass,
                    attempts,
                }
            }

            PageState::Selecting {
                image,
                pass,
                attempts,
            } => self.select_or_fall_back(page_index, image, pass, attempts),

            terminal => terminal,
        }
    }

    fn select_or_fall_back(
        &self,
        page_index: usize,
        image: Arc<GrayImage>,
        pass: Pass,
        attempts: Vec<OcrAttemptResult>,
    ) -> PageState {
        let primary_count = self.profiles.len();

        // Best attempt of the pass that just ran, if it read any text
        let pass_attempts: Vec<OcrAttemptResult> = attempts
            .iter()
            .filter(|a| (a.profile_index >= primary_count) == (pass == Pass::Fallback))
            .filter(|a| !a.text.is_empty())
            .cloned()
            .collect();
        if let Ok(chosen) = select(&pass_attempts) {
            return PageState::Done(self.finish(page_index, chosen));
        }

        if pass == Pass::Primary && !self.fallback_profiles.is_empty() {
            debug!("No text from primary profiles, trying fallback profiles");
            return PageState::Recognizing {
                image,
                pass: Pass::Fallback,
                attempts,
            };
        }
        drop(image);

        // No text anywhere: keep the least-bad successful attempt
        if let Ok(chosen) = select(&attempts) {
            return PageState::Done(self.finish(page_index, chosen));
        }

        let all_failed = OcrError::AllAttemptsFailed {
            attempts: attempts.len(),
        };
        let failure = OcrError::PageOcrFailed {
            page: page_index,
            reason: all_failed.to_string(),
        };
        let mut result = PageResult::failed(page_index, &failure);
        if let Some(partial) = best_partial(&attempts) {
            result.text = partial.text;
            result.confidence = partial.confidence;
            result.used_fallback = true;
            result.profile = Some(partial.profile.to_string());
        }
        PageState::Failed(result)
    }

    fn finish(&self, page_index: usize, chosen: Selection) -> PageResult {
        PageResult {
            page_index,
            text: chosen.text,
            confidence: chosen.confidence,
            used_fallback: chosen.profile_index >= self.profiles.len(),
            profile: Some(chosen.profile.to_string()),
            failure: None,
        }
    }
}

/// A panic in a page's blocking work becomes a page failure
fn crashed(page_index: usize, err: tokio::task::JoinError) -> PageState {
    let crash = OcrError::WorkerCrash {
        page: page_index,
        reason: err.to_string(),
    };
    PageState::Failed(PageResult::failed(
        page_index,
        &OcrError::PageOcrFailed {
            page: page_index,
            reason: crash.to_string(),
        },
    ))
}
