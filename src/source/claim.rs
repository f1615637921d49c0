use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::trace;

/// Appended to a file name while a worker owns the file
pub const CLAIM_SUFFIX: &str = ".lock";

#[derive(Debug, Error)]
pub enum ClaimError {
    #[error("failed to claim '{path}': {source}")]
    Rename {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("claimed file '{path}' does not exist after rename")]
    Vanished { path: PathBuf },
}

/// A log file this worker owns exclusively. The file lives at `path()`
/// until it is finalized.
#[derive(Debug)]
pub struct ClaimedFile {
    original: PathBuf,
    claimed: PathBuf,
}

impl ClaimedFile {
    /// Path the file was discovered under
    pub fn original_path(&self) -> &Path {
        &self.original
    }

    /// Current on-disk location
    pub fn path(&self) -> &Path {
        &self.claimed
    }

    /// Discovered file name, without the claim suffix
    pub fn original_file_name(&self) -> Option<&OsStr> {
        self.original.file_name()
    }
}

pub fn claimed_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(CLAIM_SUFFIX);
    PathBuf::from(name)
}

/// Takes ownership of `path` by renaming it to `<path>.lock`.
///
/// The rename is atomic, so when several workers (or overlapping runs) race
/// for the same file exactly one of them succeeds; the rest see the source
/// gone and get `ClaimError::Rename`.
pub async fn claim(path: &Path) -> Result<ClaimedFile, ClaimError> {
    let claimed = claimed_path(path);
    trace!(file = %path.display(), "Locking file");

    tokio::fs::rename(path, &claimed)
        .await
        .map_err(|source| ClaimError::Rename {
            path: path.to_path_buf(),
            source,
        })?;

    if !tokio::fs::try_exists(&claimed).await.unwrap_or(false) {
        return Err(ClaimError::Vanished { path: claimed });
    }

    Ok(ClaimedFile {
        original: path.to_path_buf(),
        claimed,
    })
}
