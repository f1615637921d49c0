//! Destinations for rendered bulk payloads.
//!
//! A sink only moves bytes: the uploader decides what goes into each
//! request, the sink sends it and reports whether the transport succeeded.

pub mod bulk;
pub mod elasticsearch;
pub mod memory;

use async_trait::async_trait;
use thiserror::Error;

pub use bulk::{group_by_day, index_name, render_bulk_payload, BulkUploader, DayGroups, UploadOutcome};
pub use elasticsearch::ElasticsearchSink;
pub use memory::MemorySink;

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("bulk endpoint returned error status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("invalid bulk endpoint: {0}")]
    Endpoint(String),

    #[error("failed to serialize bulk payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("rejected by sink: {0}")]
    Rejected(String),
}

/// Index and document type a bulk request is addressed to
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BulkTarget {
    pub index: String,
    pub document_type: String,
}

#[async_trait]
pub trait BulkSink: Send + Sync {
    /// Sends one newline-delimited bulk payload. Called once per chunk; the
    /// caller awaits each call before starting the next.
    async fn send(&self, target: &BulkTarget, payload: String) -> Result<(), SinkError>;
}
