use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::time::Duration;

/// Port appended to `elasticsearch_url` when the URL does not carry one.
pub const DEFAULT_ELASTICSEARCH_PORT: u16 = 9200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory scanned for `*.log` files. Defaults to the working directory.
    #[serde(default)]
    pub source_directory: Option<PathBuf>,

    /// Field holding the date part of each entry (e.g. `date`)
    pub date_field: String,

    /// Field holding the time-of-day part of each entry (e.g. `time`)
    pub time_field: String,

    /// Pattern for `date_field`: strptime (`%Y-%m-%d`) or `yyyy-MM-dd` style
    pub date_format: String,

    pub elasticsearch_url: String,

    #[serde(default = "default_elasticsearch_port")]
    pub elasticsearch_port: u16,

    /// Index name template, `{date}` is replaced by `yyyy.MM.dd`
    pub index_format: String,

    #[serde(default = "default_document_type")]
    pub document_type: String,

    /// Static pairs merged into every record; they win over parsed fields
    #[serde(default)]
    pub enrich_with: BTreeMap<String, String>,

    pub processed_directory: PathBuf,

    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default)]
    pub max_concurrent_files: Option<usize>,

    #[serde(default = "default_request_timeout", with = "humantime_serde")]
    pub request_timeout: Duration,

    /// Directory for the daily rolling log file. Console only when unset.
    #[serde(default)]
    pub log_directory: Option<PathBuf>,
}

fn default_elasticsearch_port() -> u16 {
    DEFAULT_ELASTICSEARCH_PORT
}

fn default_document_type() -> String {
    "iis".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Config {
    /// Number of files processed at once. Falls back to the machine's
    /// available parallelism when not configured.
    pub fn concurrency_limit(&self) -> usize {
        self.max_concurrent_files.unwrap_or_else(|| {
            std::thread::available_parallelism()
                .map(NonZeroUsize::get)
                .unwrap_or(1)
        })
    }
}
