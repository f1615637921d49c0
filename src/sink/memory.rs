use super::{BulkSink, BulkTarget, SinkError};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::{Arc, Mutex};

/// A request as seen by [`MemorySink`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentRequest {
    pub target: BulkTarget,
    pub payload: String,
    pub accepted: bool,
}

impl SentRequest {
    /// Number of documents in the payload (two lines per document)
    pub fn document_count(&self) -> usize {
        self.payload.lines().count() / 2
    }
}

/// Keeps every payload in memory. Selected calls (zero-based, counted across
/// the sink's lifetime) can be made to fail.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    requests: Arc<Mutex<Vec<SentRequest>>>,
    failing_calls: Arc<HashSet<usize>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(calls: impl IntoIterator<Item = usize>) -> Self {
        Self {
            requests: Arc::default(),
            failing_calls: Arc::new(calls.into_iter().collect()),
        }
    }

    pub fn requests(&self) -> Vec<SentRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn accepted_documents(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.accepted)
            .map(SentRequest::document_count)
            .sum()
    }
}

#[async_trait]
impl BulkSink for MemorySink {
    async fn send(&self, target: &BulkTarget, payload: String) -> Result<(), SinkError> {
        let mut requests = self
            .requests
            .lock()
            .map_err(|_| SinkError::Rejected("request log poisoned".to_string()))?;

        let call = requests.len();
        let accepted = !self.failing_calls.contains(&call);
        requests.push(SentRequest {
            target: target.clone(),
            payload,
            accepted,
        });

        if accepted {
            Ok(())
        } else {
            Err(SinkError::Rejected(format!("call {} configured to fail", call)))
        }
    }
}
