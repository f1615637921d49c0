use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Extension of the files picked up by a run
pub const LOG_EXTENSION: &str = "log";

/// Lists the `*.log` files directly inside `dir`, oldest first.
///
/// Age is the creation time where the platform reports one and the
/// modification time otherwise. Claimed (`.log.lock`) and finalized
/// (`.log.error`) files have a different extension and are never listed.
pub async fn discover_log_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut candidates: Vec<(Option<SystemTime>, PathBuf)> = Vec::new();

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if !is_log_file(&path) {
            continue;
        }

        // The entry may be claimed by someone else between listing and stat
        let Ok(metadata) = entry.metadata().await else {
            continue;
        };
        if !metadata.is_file() {
            continue;
        }

        let age = metadata.created().or_else(|_| metadata.modified()).ok();
        candidates.push((age, path));
    }

    candidates.sort();
    Ok(candidates.into_iter().map(|(_, path)| path).collect())
}

pub fn is_log_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == LOG_EXTENSION)
}
