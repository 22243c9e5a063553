//! Subcommands and the wiring they share.

pub mod config;
pub mod ingest;
pub mod process;
pub mod serve;

use std::path::{Path, PathBuf};

use tracing::debug;

use gastos_core::{
    CompletionClient, GastosConfig, InvoicePipeline, OcrBackend, OpenAiClient, PureOcrEngine,
    SqliteInvoiceStore,
};

/// Pipeline as assembled by the binary; tests swap the boxed collaborators.
pub type LivePipeline =
    InvoicePipeline<Box<dyn OcrBackend>, Box<dyn CompletionClient>, SqliteInvoiceStore>;

/// Platform config file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("gastos")
        .join("config.json")
}

/// Explicit `--config` file, else the platform file if present, else defaults.
pub fn load_config(config_path: Option<&str>) -> anyhow::Result<GastosConfig> {
    if let Some(path) = config_path {
        return GastosConfig::from_file(Path::new(path))
            .map_err(|e| anyhow::anyhow!("Failed to read config {}: {}", path, e));
    }

    let default_path = default_config_path();
    if default_path.exists() {
        debug!("Using config from {}", default_path.display());
        Ok(GastosConfig::from_file(&default_path)?)
    } else {
        Ok(GastosConfig::default())
    }
}

/// Load the OCR models and the model client, then wire them around `store`.
///
/// Blocks: the HTTP client owns its own runtime, so call this off the async executor.
pub fn build_pipeline(config: &GastosConfig, store: SqliteInvoiceStore) -> anyhow::Result<LivePipeline> {
    let ocr = PureOcrEngine::from_config(&config.ocr).map_err(|e| {
        anyhow::anyhow!(
            "Failed to load OCR models from {}: {}",
            config.ocr.model_dir.display(),
            e
        )
    })?;
    let client = OpenAiClient::from_config(&config.llm)?;
    debug!("Using model {} at {}", client.model(), config.llm.base_url);

    Ok(InvoicePipeline::new(
        config,
        Box::new(ocr) as Box<dyn OcrBackend>,
        Box::new(client) as Box<dyn CompletionClient>,
        store,
    ))
}

/// Drop the pipeline and close its store.
pub fn shutdown_pipeline(pipeline: LivePipeline) -> anyhow::Result<()> {
    pipeline.into_store().close()?;
    Ok(())
}
