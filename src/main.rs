use anyhow::Context;
use book_ocr::book::{discover_pages, partial_output_path, BookPipeline, Checkpoint};
use book_ocr::cli::Args;
use book_ocr::config::{EngineConfig, PipelineConfig};
use book_ocr::engines::EngineRegistry;
use book_ocr::error::OcrError;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| args.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting book-ocr v{}", env!("CARGO_PKG_VERSION"));

    let config = PipelineConfig::from(&args);
    let engine_config = EngineConfig::for_pipeline(&config, args.cache_dir.clone());

    let pages = discover_pages(&args.input)
        .with_context(|| format!("Failed to read pages from {}", args.input.display()))?;
    if pages.is_empty() {
        return Err(OcrError::NoInputPages.into());
    }
    tracing::info!("Found {} pages in {}", pages.len(), args.input.display());

    // Engine models are loaded synchronously and may be downloaded first
    let registry =
        tokio::task::spawn_blocking(move || EngineRegistry::new(&engine_config)).await??;
    let engine = match &args.engine {
        Some(name) => registry.get(name).with_context(|| {
            format!(
                "Unknown engine '{}'; available: {}",
                name,
                registry.list().join(", ")
            )
        })?,
        None => registry
            .default()
            .context("No default OCR engine available")?,
    };

    let languages: Vec<String> = config
        .profiles
        .iter()
        .chain(&config.fallback_profiles)
        .map(|p| p.language.clone())
        .collect();
    let unsupported = EngineRegistry::unsupported_languages(engine.as_ref(), &languages);
    if !unsupported.is_empty() {
        tracing::warn!(
            engine = engine.name(),
            languages = ?unsupported,
            "Engine does not support every profile language"
        );
    }
    tracing::info!(
        engine = engine.name(),
        profiles = config.profiles.len(),
        fallback_profiles = config.fallback_profiles.len(),
        workers = config.page_workers,
        attempt_workers = config.attempt_workers,
        "Using {}",
        engine.description()
    );

    let checkpoint_path = args.checkpoint_path();
    let completed = if args.resume {
        match Checkpoint::load_if_exists(&checkpoint_path)? {
            Some(checkpoint) if checkpoint.total_pages != pages.len() => {
                anyhow::bail!(
                    "Checkpoint {} covers {} pages but the input has {}",
                    checkpoint_path.display(),
                    checkpoint.total_pages,
                    pages.len()
                );
            }
            Some(checkpoint) => {
                tracing::info!(
                    "Resuming with {} finished pages from {}",
                    checkpoint.pages.len(),
                    checkpoint_path.display()
                );
                checkpoint.pages
            }
            None => {
                tracing::warn!(
                    "No checkpoint at {}, starting from the first page",
                    checkpoint_path.display()
                );
                Vec::new()
            }
        }
    } else {
        Vec::new()
    };

    let pipeline = BookPipeline::new(engine, &config).with_checkpoint(&checkpoint_path);

    let stop = pipeline.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted; finishing pages in flight");
            stop.stop();
        }
    });

    let transcript = pipeline.resume(pages, completed).await?;
    let summary = transcript.summary();

    if transcript.is_complete() {
        transcript.write_to(&args.output, &args.page_separator)?;
        Checkpoint::remove(&checkpoint_path)?;
        tracing::info!(
            "Wrote {} pages to {} ({} recognized, {} recovered by fallback, {} failed)",
            summary.completed_pages,
            args.output.display(),
            summary.recognized,
            summary.recovered_by_fallback,
            summary.failed
        );
    } else {
        let partial = partial_output_path(&args.output);
        transcript.write_to(&partial, &args.page_separator)?;
        tracing::warn!(
            "Run stopped after {} of {} pages; partial transcript in {}, rerun with --resume to continue",
            summary.completed_pages,
            summary.expected_pages,
            partial.display()
        );
    }

    Ok(())
}
