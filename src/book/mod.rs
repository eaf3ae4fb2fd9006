//! Book-level processing
//!
//! Pages are recognized independently, possibly in parallel, and collected
//! into a [`BookTranscript`] ordered by page index.

pub mod checkpoint;
pub mod input;
pub mod page;
pub mod pipeline;
pub mod progress;
pub mod transcript;

pub use checkpoint::Checkpoint;
pub use input::{discover_pages, pages_from_images, PageSource, RawPage};
pub use page::{PageProcessor, PageState};
pub use pipeline::{BookPipeline, StopHandle};
pub use progress::ProgressTracker;
pub use transcript::{partial_output_path, BookTranscript, PageResult, TranscriptSummary};
