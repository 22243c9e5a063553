//! Process command - analyze a single document without registering it.

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use gastos_core::{Analysis, RawDocument, SqliteInvoiceStore};

use super::{build_pipeline, load_config, shutdown_pipeline};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input file (jpg, jpeg, png or pdf)
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Pretty-print the JSON output
    #[arg(long)]
    pretty: bool,
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let config = load_config(config_path)?;

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    let document = RawDocument::from_path(&args.input)?;
    // Reject bad inputs before loading any model
    document.validate()?;

    info!("Processing file: {}", args.input.display());
    let start = Instant::now();

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.set_message(format!("Analyzing {}", document.filename));
    spinner.enable_steady_tick(std::time::Duration::from_millis(120));

    let analysis = tokio::task::spawn_blocking(move || -> anyhow::Result<Analysis> {
        // Analysis never writes, so a scratch store stands in for the real one
        let pipeline = build_pipeline(&config, SqliteInvoiceStore::open_in_memory()?)?;
        let analysis = pipeline.analyze(&document);
        shutdown_pipeline(pipeline)?;
        Ok(analysis?)
    })
    .await??;

    spinner.finish_and_clear();

    let value = analysis.to_json();
    let output = if args.pretty {
        serde_json::to_string_pretty(&value)?
    } else {
        serde_json::to_string(&value)?
    };

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    if let Analysis::Unparsed { .. } = analysis {
        eprintln!(
            "{} The model answer was not valid JSON; printed as raw_response.",
            style("⚠").yellow()
        );
    }

    info!("Processed in {}ms", start.elapsed().as_millis());
    Ok(())
}
