use super::{BulkSink, BulkTarget, SinkError};
use crate::config::Config;
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Url;
use std::time::Duration;
use tracing::trace;

const NDJSON: &str = "application/x-ndjson";

/// Longest slice of an error response kept for the log line
const MAX_ERROR_BODY: usize = 512;

/// Posts bulk payloads to `<base>:<port>/<index>/<type>/_bulk`.
#[derive(Debug, Clone)]
pub struct ElasticsearchSink {
    base_url: Url,
    client: reqwest::Client,
}

impl ElasticsearchSink {
    /// `default_port` is used only when `base_url` has no explicit port.
    pub fn new(base_url: &str, default_port: u16, timeout: Duration) -> Result<Self, SinkError> {
        let mut url = Url::parse(base_url)
            .map_err(|e| SinkError::Endpoint(format!("'{}': {}", base_url, e)))?;

        if url.port().is_none() {
            url.set_port(Some(default_port))
                .map_err(|_| SinkError::Endpoint(format!("'{}' cannot carry a port", base_url)))?;
        }

        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            base_url: url,
            client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, SinkError> {
        Self::new(
            &config.elasticsearch_url,
            config.elasticsearch_port,
            config.request_timeout,
        )
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn bulk_url(&self, target: &BulkTarget) -> Result<Url, SinkError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| SinkError::Endpoint(format!("'{}' cannot be a base URL", self.base_url)))?
            .pop_if_empty()
            .push(&target.index)
            .push(&target.document_type)
            .push("_bulk");
        Ok(url)
    }
}

#[async_trait]
impl BulkSink for ElasticsearchSink {
    async fn send(&self, target: &BulkTarget, payload: String) -> Result<(), SinkError> {
        let url = self.bulk_url(target)?;
        trace!(url = %url, bytes = payload.len(), "Posting bulk payload");

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, NDJSON)
            .body(payload)
            .send()
            .await?;

        // Per-document results in the body are not checked
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let mut message = response.text().await.unwrap_or_default();
            if message.len() > MAX_ERROR_BODY {
                let cut = (0..=MAX_ERROR_BODY)
                    .rev()
                    .find(|&i| message.is_char_boundary(i))
                    .unwrap_or(0);
                message.truncate(cut);
            }
            return Err(SinkError::Status { status, message });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn target(index: &str) -> BulkTarget {
        BulkTarget {
            index: index.to_string(),
            document_type: "iis".to_string(),
        }
    }

    #[test]
    fn test_default_port_appended() {
        let sink = ElasticsearchSink::new("http://localhost", 9200, Duration::from_secs(1)).unwrap();
        assert_eq!(
            sink.bulk_url(&target("iis-2024.01.02")).unwrap().as_str(),
            "http://localhost:9200/iis-2024.01.02/iis/_bulk"
        );
    }

    #[test]
    fn test_explicit_port_kept() {
        let sink = ElasticsearchSink::new("http://es.internal:9201/", 9200, Duration::from_secs(1)).unwrap();
        assert_eq!(
            sink.bulk_url(&target("logs")).unwrap().as_str(),
            "http://es.internal:9201/logs/iis/_bulk"
        );
    }

    #[test]
    fn test_base_path_preserved() {
        let sink = ElasticsearchSink::new("https://proxy.example.com/es", 443, Duration::from_secs(1)).unwrap();
        assert_eq!(
            sink.bulk_url(&target("logs")).unwrap().as_str(),
            "https://proxy.example.com/es/logs/iis/_bulk"
        );
    }

    #[test]
    fn test_invalid_url() {
        assert!(matches!(
            ElasticsearchSink::new("not a url", 9200, Duration::from_secs(1)),
            Err(SinkError::Endpoint(_))
        ));
    }
}
