use crate::config::Config;
use crate::pipeline::finalize::{finalize, FinalizeError};
use crate::sink::{group_by_day, BulkSink, BulkUploader, UploadOutcome};
use crate::source::{claim, discover_log_files, ClaimError, RecordParser, TimestampError};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, info_span, Instrument};

/// Errors that stop a whole run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to list '{path}': {source}")]
    Discover {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Errors that end a single file's pipeline without a terminal move
#[derive(Debug, Error)]
pub enum FileError {
    #[error("claim failed: {0}")]
    Claim(#[from] ClaimError),

    #[error("finalize failed: {0}")]
    Finalize(#[from] FinalizeError),
}

/// How a claimed file ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// Parsed and uploaded; `upload` tells whether any chunk failed
    Uploaded {
        destination: PathBuf,
        upload: UploadOutcome,
    },
    /// Parse aborted, nothing was uploaded
    ParseFailed { destination: PathBuf, error: String },
}

impl FileOutcome {
    pub fn failed(&self) -> bool {
        match self {
            FileOutcome::Uploaded { upload, .. } => upload.failed(),
            FileOutcome::ParseFailed { .. } => true,
        }
    }

    pub fn destination(&self) -> &Path {
        match self {
            FileOutcome::Uploaded { destination, .. } | FileOutcome::ParseFailed { destination, .. } => {
                destination
            }
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub discovered: usize,
    /// Claim lost to another worker or run
    pub skipped: usize,
    /// Finalized under the plain name
    pub succeeded: usize,
    /// Finalized under the error name
    pub failed: usize,
    /// Claimed but never moved to the processed directory
    pub unfinalized: usize,
    pub records_uploaded: usize,
}

impl RunSummary {
    fn record(&mut self, result: Result<FileOutcome, FileError>) {
        match result {
            Ok(outcome) => {
                if outcome.failed() {
                    self.failed += 1;
                } else {
                    self.succeeded += 1;
                }
                if let FileOutcome::Uploaded { upload, .. } = outcome {
                    self.records_uploaded += upload.records_sent;
                }
            }
            Err(FileError::Claim(_)) => self.skipped += 1,
            Err(FileError::Finalize(_)) => self.unfinalized += 1,
        }
    }
}

/// Claims, parses, uploads and finalizes the log files of a directory.
///
/// Cheap to clone; every file task gets its own handle onto the shared,
/// read-only parser and uploader.
#[derive(Clone)]
pub struct Pipeline {
    parser: Arc<RecordParser>,
    uploader: BulkUploader,
    processed_directory: PathBuf,
    concurrency: usize,
}

impl Pipeline {
    pub fn new(
        parser: RecordParser,
        uploader: BulkUploader,
        processed_directory: PathBuf,
        concurrency: usize,
    ) -> Self {
        Self {
            parser: Arc::new(parser),
            uploader,
            processed_directory,
            concurrency: concurrency.max(1),
        }
    }

    pub fn from_config(config: &Config, sink: Arc<dyn BulkSink>) -> Result<Self, TimestampError> {
        Ok(Self::new(
            RecordParser::from_config(config)?,
            BulkUploader::from_config(sink, config),
            config.processed_directory.clone(),
            config.concurrency_limit(),
        ))
    }

    /// Processes every `*.log` file currently in `directory`, at most
    /// `concurrency` at a time. A failure in one file never affects another.
    pub async fn run(&self, directory: &Path) -> Result<RunSummary, PipelineError> {
        let files = discover_log_files(directory)
            .await
            .map_err(|source| PipelineError::Discover {
                path: directory.to_path_buf(),
                source,
            })?;

        let mut summary = RunSummary {
            discovered: files.len(),
            ..RunSummary::default()
        };

        if files.is_empty() {
            info!(directory = %directory.display(), "No *.log files found to process");
            return Ok(summary);
        }

        info!(
            directory = %directory.display(),
            files = files.len(),
            concurrency = self.concurrency,
            "Processing log files"
        );

        // Each task holds a permit until its file is finalized
        let slots = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for path in files {
            let Ok(permit) = slots.clone().acquire_owned().await else {
                break;
            };
            let pipeline = self.clone();
            let span = info_span!("file", file = %path.display());
            tasks.spawn(
                async move {
                    let _permit = permit;
                    let result = pipeline.process_file(&path).await;
                    if let Err(e) = &result {
                        error!(error = %e, "File not processed");
                    }
                    result
                }
                .instrument(span),
            );
        }

        // Collect outcomes; a panicked task counts as unfinalized
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => summary.record(result),
                Err(e) => {
                    error!(error = %e, "File task panicked");
                    summary.unfinalized += 1;
                }
            }
        }

        info!(
            discovered = summary.discovered,
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            unfinalized = summary.unfinalized,
            records = summary.records_uploaded,
            "Run complete"
        );

        Ok(summary)
    }

    /// claim -> parse -> group by day -> upload -> finalize, strictly in order.
    pub async fn process_file(&self, path: &Path) -> Result<FileOutcome, FileError> {
        let claimed = claim(path).await?;

        // Parsing is blocking file I/O
        let parser = self.parser.clone();
        let claimed_path = claimed.path().to_path_buf();
        let parsed = tokio::task::spawn_blocking(move || parser.parse_file(&claimed_path))
            .await
            .map_err(|e| e.to_string())
            .and_then(|result| result.map_err(|e| e.to_string()));

        let records = match parsed {
            Ok(parsed) => parsed.records,
            // Nothing is uploaded from a file that failed to parse
            Err(parse_error) => {
                error!(error = %parse_error, "Parse aborted, nothing uploaded");
                let destination = finalize(claimed, true, &self.processed_directory).await?;
                info!(destination = %destination.display(), "Moved file");
                return Ok(FileOutcome::ParseFailed {
                    destination,
                    error: parse_error,
                });
            }
        };

        let groups = group_by_day(records);
        debug!(days = groups.len(), "Grouped records by day");

        let upload = self.uploader.upload(&groups).await;

        // Any failed chunk sends the whole file to the error name
        let destination = finalize(claimed, upload.failed(), &self.processed_directory).await?;

        info!(
            destination = %destination.display(),
            records = upload.records_sent,
            failed_chunks = upload.chunks_failed,
            "Finished processing file"
        );

        Ok(FileOutcome::Uploaded {
            destination,
            upload,
        })
    }
}
