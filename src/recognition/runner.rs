use crate::config::PipelineConfig;
use crate::engine::{normalize_text, OcrEngine};
use crate::error::OcrError;
use crate::profile::OcrProfile;
use futures::future::join_all;
use image::GrayImage;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::selector::score;
use super::{AttemptOutcome, OcrAttemptResult};

/// Runs one page image through the engine once per profile.
///
/// Attempts share a semaphore with every other page, so the number of engine
/// invocations in flight never exceeds the configured attempt workers.
/// An attempt that errors, panics or outlives its timeout becomes a failed
/// result; it never fails the other attempts.
#[derive(Clone)]
pub struct AttemptRunner {
    engine: Arc<dyn OcrEngine>,
    permits: Arc<Semaphore>,
    timeout: Duration,
    min_token_confidence: f32,
}

impl AttemptRunner {
    pub fn new(engine: Arc<dyn OcrEngine>, config: &PipelineConfig) -> Self {
        Self {
            engine,
            permits: Arc::new(Semaphore::new(config.attempt_workers.max(1))),
            timeout: config.attempt_timeout,
            min_token_confidence: config.min_token_confidence,
        }
    }

    pub fn engine_name(&self) -> &'static str {
        self.engine.name()
    }

    /// Run every profile against `image`.
    ///
    /// Results come back in profile order, numbered from `index_offset`.
    pub async fn run_all(
        &self,
        image: &Arc<GrayImage>,
        profiles: &[OcrProfile],
        index_offset: usize,
    ) -> Vec<OcrAttemptResult> {
        let attempts = profiles
            .iter()
            .enumerate()
            .map(|(i, profile)| self.run_one(image, profile.clone(), index_offset + i));
        join_all(attempts).await
    }

    async fn run_one(
        &self,
        image: &Arc<GrayImage>,
        profile: OcrProfile,
        profile_index: usize,
    ) -> OcrAttemptResult {
        let start = Instant::now();
        let result = self.invoke(image, &profile).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok((text, confidence)) => {
                debug!(
                    profile = %profile,
                    profile_index,
                    confidence,
                    chars = text.chars().count(),
                    elapsed_ms,
                    "OCR attempt finished"
                );
                OcrAttemptResult {
                    profile_index,
                    profile,
                    text,
                    confidence,
                    outcome: AttemptOutcome::Success,
                }
            }
            Err(e) => {
                warn!(
                    profile = %profile,
                    profile_index,
                    code = e.code(),
                    error = %e,
                    elapsed_ms,
                    "OCR attempt failed"
                );
                let text = match &e {
                    OcrError::PartialOutput { text, .. } => normalize_text(text),
                    _ => String::new(),
                };
                OcrAttemptResult {
                    profile_index,
                    profile,
                    text,
                    confidence: 0.0,
                    outcome: AttemptOutcome::Failed(format!("{}: {}", e.code(), e)),
                }
            }
        }
    }

    /// One engine call on a private copy of the image, under a permit and a timeout.
    ///
    /// The permit belongs to this future, not to the blocking task: when the
    /// deadline passes the slot is released even if the engine call never
    /// returns, so a hung engine cannot starve later attempts.
    async fn invoke(
        &self,
        image: &Arc<GrayImage>,
        profile: &OcrProfile,
    ) -> Result<(String, f32), OcrError> {
        let _permit = self.permits.acquire().await.map_err(|e| OcrError::AttemptFailed {
            profile: profile.to_string(),
            reason: e.to_string(),
        })?;

        let engine = Arc::clone(&self.engine);
        let shared = Arc::clone(image);
        let task_profile = profile.clone();
        let min_token_confidence = self.min_token_confidence;

        let handle = tokio::task::spawn_blocking(move || {
            let copy = GrayImage::clone(&shared);
            drop(shared);
            engine.recognize(&copy, &task_profile).map(|recognition| {
                let confidence = score(&recognition, min_token_confidence);
                (normalize_text(&recognition.text), confidence)
            })
        });

        match tokio::time::timeout(self.timeout, handle).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(OcrError::AttemptFailed {
                profile: profile.to_string(),
                reason: if join_err.is_panic() {
                    "engine panicked".to_string()
                } else {
                    join_err.to_string()
                },
            }),
            Err(_) => Err(OcrError::AttemptTimedOut {
                profile: profile.to_string(),
                timeout_ms: self.timeout.as_millis() as u64,
            }),
        }
    }
}
