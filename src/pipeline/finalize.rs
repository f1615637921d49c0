use crate::source::ClaimedFile;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs::OpenOptions;
use tracing::{debug, warn};

/// Appended to the file name of files with at least one failed upload
pub const ERROR_SUFFIX: &str = ".error";

#[cfg(windows)]
const CROSS_DEVICE: i32 = 17; // ERROR_NOT_SAME_DEVICE
#[cfg(not(windows))]
const CROSS_DEVICE: i32 = 18; // EXDEV

#[derive(Debug, Error)]
pub enum FinalizeError {
    #[error("claimed file '{path}' has no file name")]
    NoFileName { path: PathBuf },

    #[error("failed to create processed directory '{path}': {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("'{path}' already exists")]
    DestinationExists { path: PathBuf },

    #[error("failed to move '{from}' to '{to}': {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Terminal location for a claimed file: the discovered name on success,
/// the discovered name plus `.error` on failure.
pub fn destination(
    claimed: &ClaimedFile,
    failed: bool,
    processed_dir: &Path,
) -> Result<PathBuf, FinalizeError> {
    let name = claimed
        .original_file_name()
        .ok_or_else(|| FinalizeError::NoFileName {
            path: claimed.original_path().to_path_buf(),
        })?;

    let mut name = name.to_owned();
    if failed {
        name.push(ERROR_SUFFIX);
    }
    Ok(processed_dir.join(name))
}

/// Moves a claimed file to its terminal location. Consumes the claim, so a
/// file can only be finalized once.
///
/// An existing file at the destination is never replaced. On any error the
/// claimed file stays where it is and nothing is left at the destination.
pub async fn finalize(
    claimed: ClaimedFile,
    failed: bool,
    processed_dir: &Path,
) -> Result<PathBuf, FinalizeError> {
    let to = destination(&claimed, failed, processed_dir)?;

    tokio::fs::create_dir_all(processed_dir)
        .await
        .map_err(|source| FinalizeError::CreateDir {
            path: processed_dir.to_path_buf(),
            source,
        })?;

    let from = claimed.path();
    let move_error = |source: io::Error| FinalizeError::Move {
        from: from.to_path_buf(),
        to: to.clone(),
        source,
    };

    // A hard link fails instead of replacing an existing destination
    match tokio::fs::hard_link(from, &to).await {
        Ok(()) => {
            if let Err(source) = tokio::fs::remove_file(from).await {
                discard(&to).await;
                return Err(move_error(source));
            }
        }
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(FinalizeError::DestinationExists { path: to.clone() });
        }
        Err(err) if is_cross_device(&err) => move_by_copy(from, &to).await?,
        Err(source) => return Err(move_error(source)),
    }

    debug!(destination = %to.display(), "Moved file");
    Ok(to)
}

fn is_cross_device(err: &io::Error) -> bool {
    err.raw_os_error() == Some(CROSS_DEVICE)
}

/// Copy into a freshly created destination, then delete the source.
async fn move_by_copy(from: &Path, to: &Path) -> Result<(), FinalizeError> {
    let mut target = match OpenOptions::new().write(true).create_new(true).open(to).await {
        Ok(file) => file,
        Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
            return Err(FinalizeError::DestinationExists {
                path: to.to_path_buf(),
            });
        }
        Err(source) => {
            return Err(FinalizeError::Move {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
                source,
            });
        }
    };

    let copied = async {
        let mut source = tokio::fs::File::open(from).await?;
        tokio::io::copy(&mut source, &mut target).await?;
        target.sync_all().await?;
        tokio::fs::remove_file(from).await?;
        Ok::<_, io::Error>(())
    }
    .await;
    drop(target);

    if let Err(source) = copied {
        discard(to).await;
        return Err(FinalizeError::Move {
            from: from.to_path_buf(),
            to: to.to_path_buf(),
            source,
        });
    }
    Ok(())
}

async fn discard(path: &Path) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!(path = %path.display(), error = %e, "Failed to remove incomplete destination");
    }
}
