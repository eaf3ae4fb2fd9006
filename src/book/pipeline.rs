use crate::config::PipelineConfig;
use crate::engine::OcrEngine;
use crate::error::OcrError;
use crate::recognition::AttemptRunner;
use futures::{future, stream, StreamExt};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

use super::checkpoint::Checkpoint;
use super::input::RawPage;
use super::page::PageProcessor;
use super::progress::ProgressTracker;
use super::transcript::{BookTranscript, PageResult};

/// Cooperative stop request for a running book.
///
/// Pages already dispatched finish normally; no new page starts after
/// `stop` is called.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Processes every page of a book and assembles the transcript in page order
pub struct BookPipeline {
    processor: PageProcessor,
    page_workers: usize,
    checkpoint_interval: usize,
    checkpoint_path: Option<PathBuf>,
    stop: StopHandle,
}

impl BookPipeline {
    pub fn new(engine: Arc<dyn OcrEngine>, config: &PipelineConfig) -> Self {
        let runner = AttemptRunner::new(engine, config);
        Self {
            processor: PageProcessor::new(runner, config),
            page_workers: config.page_workers.max(1),
            checkpoint_interval: config.checkpoint_interval,
            checkpoint_path: None,
            stop: StopHandle::new(),
        }
    }

    /// Persist finalized pages to `path` while running
    pub fn with_checkpoint(mut self, path: impl Into<PathBuf>) -> Self {
        self.checkpoint_path = Some(path.into());
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Process all pages
    pub async fn run(&self, pages: Vec<RawPage>) -> Result<BookTranscript, OcrError> {
        self.resume(pages, Vec::new()).await
    }

    /// Process the pages that have no entry in `completed`.
    ///
    /// `pages` must be numbered 1..=N. Completed results are kept as they
    /// are, so resuming an interrupted run yields the same transcript as an
    /// uninterrupted one.
    pub async fn resume(
        &self,
        pages: Vec<RawPage>,
        completed: Vec<PageResult>,
    ) -> Result<BookTranscript, OcrError> {
        if pages.is_empty() {
            return Err(OcrError::NoInputPages);
        }
        let total = pages.len();
        validate_numbering(&pages)?;

        let mut done: BTreeMap<usize, PageResult> = BTreeMap::new();
        for result in completed {
            if (1..=total).contains(&result.page_index) {
                done.entry(result.page_index).or_insert(result);
            } else {
                warn!(
                    page = result.page_index,
                    total, "Ignoring completed result outside the book"
                );
            }
        }

        let pending: Vec<RawPage> = pages
            .into_iter()
            .filter(|p| !done.contains_key(&p.index))
            .collect();

        info!(
            total,
            resumed = done.len(),
            pending = pending.len(),
            workers = self.page_workers,
            "Starting book"
        );

        let mut progress = ProgressTracker::new(total, done.len());
        let mut since_checkpoint = 0;

        let stop = self.stop.clone();
        let mut results = stream::iter(pending)
            .take_while(move |_| future::ready(!stop.is_stopped()))
            .map(|page| {
                let processor = self.processor.clone();
                let page_index = page.index;
                async move {
                    let start = Instant::now();
                    let result =
                        isolated(page_index, async move { processor.process(page).await }).await;
                    (result, start.elapsed())
                }
            })
            .buffer_unordered(self.page_workers);

        while let Some((result, elapsed)) = results.next().await {
            progress.record(result.page_index, elapsed);
            done.entry(result.page_index).or_insert(result);

            since_checkpoint += 1;
            if self.checkpoint_interval > 0 && since_checkpoint >= self.checkpoint_interval {
                self.save_checkpoint(total, &done);
                since_checkpoint = 0;
            }
        }
        drop(results);

        if since_checkpoint > 0 || self.stop.is_stopped() {
            self.save_checkpoint(total, &done);
        }

        let transcript = BookTranscript::assemble(done.into_values(), total);
        let summary = transcript.summary();
        if transcript.is_complete() {
            info!(
                pages = summary.completed_pages,
                recognized = summary.recognized,
                fallback = summary.recovered_by_fallback,
                failed = summary.failed,
                mean_confidence = summary.mean_confidence,
                "Book finished"
            );
        } else {
            info!(
                completed = summary.completed_pages,
                total,
                missing = transcript.missing_pages().len(),
                "Book stopped before all pages were processed"
            );
        }
        Ok(transcript)
    }

    /// A failed checkpoint write is logged; the run itself continues
    fn save_checkpoint(&self, total: usize, done: &BTreeMap<usize, PageResult>) {
        let Some(path) = &self.checkpoint_path else {
            return;
        };
        let checkpoint = Checkpoint::new(total, done.values().cloned().collect());
        if let Err(e) = checkpoint.save(path) {
            warn!(code = e.code(), error = %e, "Failed to write checkpoint");
        }
    }
}

/// Run one page as its own task. A panic anywhere in it becomes a failed
/// page instead of tearing down the book.
async fn isolated<F>(page_index: usize, work: F) -> PageResult
where
    F: Future<Output = PageResult> + Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(result) => result,
        Err(e) => {
            let crash = OcrError::WorkerCrash {
                page: page_index,
                reason: e.to_string(),
            };
            error!(page = page_index, code = crash.code(), error = %crash, "Page worker crashed");
            PageResult::failed(page_index, &crash)
        }
    }
}

fn validate_numbering(pages: &[RawPage]) -> Result<(), OcrError> {
    let mut indexes: Vec<usize> = pages.iter().map(|p| p.index).collect();
    indexes.sort_unstable();
    if indexes.iter().enumerate().all(|(i, &index)| index == i + 1) {
        Ok(())
    } else {
        Err(OcrError::InvalidInput(format!(
            "pages must be numbered 1..={} without gaps or duplicates",
            pages.len()
        )))
    }
}
