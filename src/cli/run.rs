use crate::config::parse::load_config;
use crate::config::search_locations;
use crate::pipeline::{Pipeline, PipelineError, RunSummary};
use crate::sink::{ElasticsearchSink, SinkError};
use crate::source::TimestampError;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] crate::config::parse::ConfigError),

    #[error("invalid timestamp settings: {0}")]
    Timestamp(#[from] TimestampError),

    #[error("sink error: {0}")]
    Sink(#[from] SinkError),

    #[error("pipeline error: {0}")]
    Pipeline(#[from] PipelineError),

    #[error("cannot determine working directory: {0}")]
    WorkingDirectory(#[source] std::io::Error),

    #[error("processed_directory '{0}' is the directory being scanned; finished files would be uploaded again")]
    ProcessedIsSource(PathBuf),
}

pub async fn run(
    config_path: Option<PathBuf>,
    directory: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let config_path = match config_path {
        Some(path) => path,
        None => {
            eprintln!("Error: config not found");
            eprintln!("Searched locations:");
            for location in search_locations() {
                eprintln!("  {}", location.display());
            }
            eprintln!("\nUse --config <path> to specify a config file, or run 'lumberjack config init' to generate one.");
            std::process::exit(1);
        }
    };

    run_pipeline(&config_path, directory).await?;
    Ok(())
}

/// Loads the config and processes the source directory once.
///
/// The directory is taken from `directory`, then `source_directory` in the
/// config, then the working directory.
pub async fn run_pipeline(
    config_path: &Path,
    directory: Option<PathBuf>,
) -> Result<RunSummary, RunError> {
    info!(config_path = %config_path.display(), "Loading configuration");
    let config = load_config(config_path)?;
    info!("Config file loaded");

    let directory = match directory.or_else(|| config.source_directory.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir().map_err(RunError::WorkingDirectory)?,
    };

    if same_directory(&directory, &config.processed_directory).await {
        return Err(RunError::ProcessedIsSource(config.processed_directory));
    }

    let sink = ElasticsearchSink::from_config(&config)?;
    info!(url = %sink.base_url(), "Using Elasticsearch endpoint");

    let pipeline = Pipeline::from_config(&config, Arc::new(sink))?;
    Ok(pipeline.run(&directory).await?)
}

/// `log_directory` from the config at `config_path`, if it loads. Load
/// errors are left for the run itself to report.
pub fn configured_log_directory(config_path: Option<&Path>) -> Option<PathBuf> {
    load_config(config_path?).ok()?.log_directory
}

async fn same_directory(a: &Path, b: &Path) -> bool {
    match (tokio::fs::canonicalize(a).await, tokio::fs::canonicalize(b).await) {
        (Ok(a), Ok(b)) => a == b,
        // A processed directory that does not exist yet cannot be the source
        _ => false,
    }
}
