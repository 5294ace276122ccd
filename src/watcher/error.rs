//! Watcher error types.

use std::path::PathBuf;

use crate::renamer::RenameError;

/// Errors that can occur while watching the download folder.
#[derive(thiserror::Error, Debug)]
pub enum WatcherError {
    /// Watched folder does not exist or is not a directory.
    #[error("Watched folder missing: {0}")]
    WatchDirMissing(PathBuf),

    /// Output folder could not be created.
    #[error("Failed to create output folder {path}: {source}")]
    OutputDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Watched folder could not be listed.
    #[error("Failed to scan {path}: {source}")]
    Scan {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Renamer error.
    #[error(transparent)]
    Rename(#[from] RenameError),
}
