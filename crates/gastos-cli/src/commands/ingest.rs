//! Ingest command - analyze and register many documents.

use std::path::{Path, PathBuf};
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, warn};

use gastos_core::{Ingestion, RawDocument, SqliteInvoiceStore};

use super::{LivePipeline, build_pipeline, load_config, shutdown_pipeline};

/// Arguments for the ingest command.
#[derive(Args)]
pub struct IngestArgs {
    /// Input files or glob pattern
    #[arg(required = true)]
    input: String,

    /// Database file (defaults to store.path from the config)
    #[arg(long)]
    db: Option<PathBuf>,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,
}

/// What happened to one file.
enum FileOutcome {
    Registered { id: i64, summary: String },
    Duplicate { id: i64, summary: String },
    Unparsed,
    Failed(String),
}

pub async fn run(args: IngestArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();
    let mut config = load_config(config_path)?;
    if let Some(db) = &args.db {
        config.store.path = db.clone();
    }

    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            matches!(ext.to_lowercase().as_str(), "pdf" | "png" | "jpg" | "jpeg")
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to ingest",
        style("ℹ").blue(),
        files.len()
    );

    let continue_on_error = args.continue_on_error;
    let results = tokio::task::spawn_blocking(move || -> anyhow::Result<Vec<(PathBuf, FileOutcome)>> {
        let store = SqliteInvoiceStore::open(&config.store.path)?;
        let pipeline = build_pipeline(&config, store)?;
        let results = ingest_all(&pipeline, files, continue_on_error);
        shutdown_pipeline(pipeline)?;
        results
    })
    .await??;

    let (mut registered, mut duplicates, mut unparsed, mut failed) = (0, 0, 0, 0);

    println!();
    for (path, outcome) in &results {
        let name = display_name(path);
        match outcome {
            FileOutcome::Registered { id, summary } => {
                registered += 1;
                println!("  {} {} #{} {}", style("✓").green(), name, id, summary)
            }
            FileOutcome::Duplicate { id, summary } => {
                duplicates += 1;
                println!(
                    "  {} {} already registered as #{} {}",
                    style("=").yellow(),
                    name,
                    id,
                    summary
                )
            }
            FileOutcome::Unparsed => {
                unparsed += 1;
                println!("  {} {} model answer was not JSON", style("?").yellow(), name)
            }
            FileOutcome::Failed(message) => {
                failed += 1;
                println!("  {} {} {}", style("✗").red(), name, message)
            }
        }
    }

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} registered, {} duplicates, {} unparsed, {} failed",
        style(registered).green(),
        style(duplicates).yellow(),
        style(unparsed).yellow(),
        style(failed).red()
    );

    Ok(())
}

fn ingest_all(
    pipeline: &LivePipeline,
    files: Vec<PathBuf>,
    continue_on_error: bool,
) -> anyhow::Result<Vec<(PathBuf, FileOutcome)>> {
    let progress = ProgressBar::new(files.len() as u64);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let mut results = Vec::with_capacity(files.len());
    for path in files {
        let outcome = match ingest_file(pipeline, &path) {
            Ok(outcome) => outcome,
            Err(e) => {
                let message = e.to_string();
                if !continue_on_error {
                    error!("Failed to ingest {}: {}", path.display(), message);
                    progress.abandon();
                    anyhow::bail!("Ingestion failed for {}: {}", path.display(), message);
                }
                warn!("Failed to ingest {}: {}", path.display(), message);
                FileOutcome::Failed(message)
            }
        };
        results.push((path, outcome));
        progress.inc(1);
    }

    progress.finish_with_message("Complete");
    Ok(results)
}

fn ingest_file(pipeline: &LivePipeline, path: &Path) -> anyhow::Result<FileOutcome> {
    let document = RawDocument::from_path(path)?;

    Ok(match pipeline.ingest(&document)? {
        Ingestion::Registered { invoice_id, record } => FileOutcome::Registered {
            id: invoice_id,
            summary: format!("{} {} {}", record.vendor, record.date_label(), record.total),
        },
        Ingestion::AlreadyRegistered { existing_id, record } => FileOutcome::Duplicate {
            id: existing_id,
            summary: format!("{} {} {}", record.vendor, record.date_label(), record.total),
        },
        Ingestion::Unparsed { .. } => FileOutcome::Unparsed,
    })
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
