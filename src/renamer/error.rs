//! Renamer error types.

use std::path::PathBuf;

/// Errors that can occur while renaming a file.
#[derive(thiserror::Error, Debug)]
pub enum RenameError {
    /// Source path has no file name component.
    #[error("Path has no file name: {0}")]
    NoFileName(PathBuf),

    /// Another file already occupies the destination.
    #[error("Destination already exists: {from} -> {to}")]
    DestinationExists { from: PathBuf, to: PathBuf },

    /// Destination could not be checked for an existing file.
    #[error("Failed to check destination {path}: {source}")]
    CheckDestination {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Output directory could not be created.
    #[error("Failed to create directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The move itself failed.
    #[error("Failed to move {from} -> {to}: {source}")]
    Move {
        from: PathBuf,
        to: PathBuf,
        source: std::io::Error,
    },

    /// Audit screenshot could not be written.
    #[error("Failed to save audit copy {path}: {source}")]
    AuditCopy {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Invalid filename pattern.
    #[error("Invalid filename pattern: {0}")]
    Pattern(#[from] regex::Error),
}
