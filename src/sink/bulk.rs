use super::{BulkSink, BulkTarget, SinkError};
use crate::config::Config;
use crate::record::Record;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, error, trace};

/// Placeholder in `index_format` replaced by the day of the records
pub const DATE_PLACEHOLDER: &str = "{date}";

/// Records of one file keyed by UTC day. Iteration order is ascending date.
pub type DayGroups = BTreeMap<NaiveDate, Vec<Record>>;

/// Partitions records by the calendar day of their timestamp, keeping file
/// order within each day.
pub fn group_by_day(records: Vec<Record>) -> DayGroups {
    let mut groups = DayGroups::new();
    for record in records {
        groups.entry(record.day()).or_default().push(record);
    }
    groups
}

pub fn index_name(template: &str, day: NaiveDate) -> String {
    template.replace(DATE_PLACEHOLDER, &day.format("%Y.%m.%d").to_string())
}

#[derive(Serialize)]
struct BulkAction<'a> {
    index: ActionMeta<'a>,
}

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_type")]
    document_type: &'a str,
}

/// Renders the newline-delimited bulk body: an `index` action line followed
/// by the document for every record, each line terminated by `\n`.
pub fn render_bulk_payload(target: &BulkTarget, records: &[Record]) -> Result<String, SinkError> {
    let action = serde_json::to_string(&BulkAction {
        index: ActionMeta {
            index: &target.index,
            document_type: &target.document_type,
        },
    })?;

    let mut payload = String::new();
    for record in records {
        payload.push_str(&action);
        payload.push('\n');
        payload.push_str(&serde_json::to_string(record)?);
        payload.push('\n');
    }
    Ok(payload)
}

/// Counters for one file's upload pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UploadOutcome {
    pub chunks_sent: usize,
    pub chunks_failed: usize,
    pub records_sent: usize,
    pub records_failed: usize,
}

impl UploadOutcome {
    /// True if any chunk of any day failed
    pub fn failed(&self) -> bool {
        self.chunks_failed > 0
    }
}

/// Sends a file's day groups to the sink in chunks of at most `chunk_size`.
#[derive(Clone)]
pub struct BulkUploader {
    sink: Arc<dyn BulkSink>,
    index_format: String,
    document_type: String,
    chunk_size: usize,
}

impl BulkUploader {
    pub fn new(
        sink: Arc<dyn BulkSink>,
        index_format: impl Into<String>,
        document_type: impl Into<String>,
        chunk_size: usize,
    ) -> Self {
        Self {
            sink,
            index_format: index_format.into(),
            document_type: document_type.into(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub fn from_config(sink: Arc<dyn BulkSink>, config: &Config) -> Self {
        Self::new(
            sink,
            config.index_format.clone(),
            config.document_type.clone(),
            config.chunk_size,
        )
    }

    /// Uploads every group, oldest day first, one chunk at a time.
    ///
    /// A failed chunk is logged and counted; the remaining chunks and days
    /// are still attempted.
    pub async fn upload(&self, groups: &DayGroups) -> UploadOutcome {
        let mut outcome = UploadOutcome::default();

        // Groups iterate oldest day first
        for (day, records) in groups {
            let target = BulkTarget {
                index: index_name(&self.index_format, *day),
                document_type: self.document_type.clone(),
            };
            trace!(index = %target.index, records = records.len(), "Using index");

            // Chunks stay within one day
            for chunk in records.chunks(self.chunk_size) {
                match self.send_chunk(&target, chunk).await {
                    Ok(()) => {
                        outcome.chunks_sent += 1;
                        outcome.records_sent += chunk.len();
                    }
                    // Keep going, the file is finalized as failed
                    Err(e) => {
                        error!(
                            index = %target.index,
                            count = chunk.len(),
                            error = %e,
                            "Error uploading chunk"
                        );
                        outcome.chunks_failed += 1;
                        outcome.records_failed += chunk.len();
                    }
                }
                debug!(
                    index = %target.index,
                    total = outcome.records_sent + outcome.records_failed,
                    "Items processed"
                );
            }
        }

        outcome
    }

    async fn send_chunk(&self, target: &BulkTarget, chunk: &[Record]) -> Result<(), SinkError> {
        let payload = render_bulk_payload(target, chunk)?;
        self.sink.send(target, payload).await
    }
}
