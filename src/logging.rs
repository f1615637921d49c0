use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{InitError, RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Daily files are named `lumberjack.log.YYYY-MM-DD`, which never matches
/// the `*.log` files picked up for processing.
pub const LOG_FILE_PREFIX: &str = "lumberjack.log";

/// Installs the global subscriber: console output, plus a daily rolling file
/// when `log_directory` is set.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the life of the process.
pub fn init(log_directory: Option<&Path>) -> Result<Option<WorkerGuard>, InitError> {
    let (file_writer, guard) = match log_directory {
        Some(dir) => {
            let (writer, guard) = daily_file_writer(dir)?;
            (Some(writer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "lumberjack=info".into()))
        .with(fmt::layer())
        .with(file_writer.map(|writer| fmt::layer().with_writer(writer).with_ansi(false)))
        .init();

    Ok(guard)
}

/// Non-blocking writer onto a file in `dir` that rolls over at midnight UTC.
/// Creates `dir` if needed.
pub fn daily_file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard), InitError> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .build(dir)?;
    Ok(tracing_appender::non_blocking(appender))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::is_log_file;
    use std::io::Write;
    use tempfile::TempDir;

    #[test]
    fn test_daily_file_writer_creates_dated_file() {
        let dir = TempDir::new().unwrap();
        let log_dir = dir.path().join("logs");

        let (mut writer, guard) = daily_file_writer(&log_dir).unwrap();
        writer.write_all(b"File not processed\n").unwrap();
        drop(guard);

        let files: Vec<_> = std::fs::read_dir(&log_dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        assert_eq!(files.len(), 1);

        let name = files[0].file_name().unwrap().to_string_lossy().into_owned();
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        assert_eq!(name, format!("{}.{}", LOG_FILE_PREFIX, today));
        assert!(!is_log_file(&files[0]));
        assert_eq!(std::fs::read_to_string(&files[0]).unwrap(), "File not processed\n");
    }
}
