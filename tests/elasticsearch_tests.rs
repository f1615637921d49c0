/// Tests for the HTTP bulk sink against a local mock of the `_bulk` endpoint
use axum::extract::{Path, State};
use axum::http::{header::CONTENT_TYPE, HeaderMap, StatusCode};
use axum::routing::post;
use axum::Router;
use lumberjack::cli::run::{run_pipeline, RunError};
use lumberjack::sink::{BulkSink, BulkTarget, ElasticsearchSink, SinkError};
use std::fs;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

#[derive(Debug, Clone)]
struct Captured {
    index: String,
    document_type: String,
    content_type: Option<String>,
    body: String,
}

#[derive(Clone)]
struct MockState {
    captured: Arc<Mutex<Vec<Captured>>>,
    /// Zero-based request numbers answered with 500
    failing: Arc<Vec<usize>>,
}

async fn bulk(
    State(state): State<MockState>,
    Path((index, document_type)): Path<(String, String)>,
    headers: HeaderMap,
    body: String,
) -> StatusCode {
    let mut captured = state.captured.lock().unwrap();
    let call = captured.len();
    captured.push(Captured {
        index,
        document_type,
        content_type: headers
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body,
    });

    if state.failing.contains(&call) {
        StatusCode::INTERNAL_SERVER_ERROR
    } else {
        StatusCode::OK
    }
}

/// Starts the mock and returns its port plus the captured requests
async fn start_mock(failing: Vec<usize>) -> (u16, Arc<Mutex<Vec<Captured>>>) {
    let captured = Arc::new(Mutex::new(Vec::new()));
    let state = MockState {
        captured: captured.clone(),
        failing: Arc::new(failing),
    };
    let app = Router::new()
        .route("/:index/:document_type/_bulk", post(bulk))
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (port, captured)
}

fn target(index: &str) -> BulkTarget {
    BulkTarget {
        index: index.to_string(),
        document_type: "iis".to_string(),
    }
}

#[tokio::test]
async fn test_posts_ndjson_to_bulk_endpoint() {
    let (port, captured) = start_mock(vec![]).await;
    let sink = ElasticsearchSink::new("http://127.0.0.1", port, Duration::from_secs(5)).unwrap();

    let payload = "{\"index\":{\"_index\":\"iis-2024.01.02\",\"_type\":\"iis\"}}\n{\"a\":\"1\"}\n";
    sink.send(&target("iis-2024.01.02"), payload.to_string())
        .await
        .unwrap();

    let captured = captured.lock().unwrap();
    assert_eq!(captured.len(), 1);
    assert_eq!(captured[0].index, "iis-2024.01.02");
    assert_eq!(captured[0].document_type, "iis");
    assert_eq!(captured[0].content_type.as_deref(), Some("application/x-ndjson"));
    assert_eq!(captured[0].body, payload);
}

#[tokio::test]
async fn test_error_status_is_reported() {
    let (port, _captured) = start_mock(vec![0]).await;
    let sink = ElasticsearchSink::new("http://127.0.0.1", port, Duration::from_secs(5)).unwrap();

    let result = sink.send(&target("logs"), "{}\n{}\n".to_string()).await;

    assert!(matches!(result, Err(SinkError::Status { status: 500, .. })));
}

#[tokio::test]
async fn test_connection_refused_is_reported() {
    // Bind and drop to get a port nothing listens on
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let sink = ElasticsearchSink::new("http://127.0.0.1", port, Duration::from_secs(5)).unwrap();

    let result = sink.send(&target("logs"), "{}\n{}\n".to_string()).await;

    assert!(matches!(result, Err(SinkError::Http(_))));
}

#[tokio::test]
async fn test_full_run_from_config_file() {
    let (port, captured) = start_mock(vec![1]).await;
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("logs");
    let processed = dir.path().join("processed");
    fs::create_dir(&source).unwrap();

    let mut good = String::from("#Fields: date time cs-method cs-uri-stem\n");
    good.push_str("2024-01-02 03:04:05 GET /\n");
    good.push_str("2024-01-03 00:00:00 GET /next-day\n");
    fs::write(source.join("good.log"), &good).unwrap();

    let config_path = dir.path().join("lumberjack.yml");
    fs::write(
        &config_path,
        format!(
            r#"
source_directory: {source}
processed_directory: {processed}
date_field: date
time_field: time
date_format: yyyy-MM-dd
elasticsearch_url: http://127.0.0.1
elasticsearch_port: {port}
index_format: "web-{{date}}"
enrich_with:
  host: web-01
"#,
            source = source.display(),
            processed = processed.display(),
            port = port,
        ),
    )
    .unwrap();

    let summary = run_pipeline(&config_path, None).await.unwrap();

    assert_eq!(summary.discovered, 1);
    assert_eq!(summary.failed, 1);
    assert!(processed.join("good.log.error").exists());

    let captured = captured.lock().unwrap();
    let indices: Vec<_> = captured.iter().map(|c| c.index.as_str()).collect();
    assert_eq!(indices, vec!["web-2024.01.02", "web-2024.01.03"]);
    assert!(captured[0].body.contains("\"host\":\"web-01\""));
    assert!(captured[0].body.contains("\"@timestamp\":\"2024-01-02T03:04:05Z\""));
}

#[tokio::test]
async fn test_run_rejects_processed_directory_equal_to_source() {
    let dir = TempDir::new().unwrap();
    let source = dir.path().join("logs");
    fs::create_dir(&source).unwrap();
    fs::write(source.join("a.log"), "#Fields: date time\n2024-01-02 03:04:05\n").unwrap();

    let config_path = dir.path().join("lumberjack.yml");
    fs::write(
        &config_path,
        format!(
            r#"
source_directory: {source}
processed_directory: {source}/.
date_field: date
time_field: time
date_format: yyyy-MM-dd
elasticsearch_url: http://127.0.0.1
index_format: "web-{{date}}"
"#,
            source = source.display(),
        ),
    )
    .unwrap();

    let result = run_pipeline(&config_path, None).await;

    assert!(matches!(result, Err(RunError::ProcessedIsSource(_))));
    assert!(source.join("a.log").exists());
}
