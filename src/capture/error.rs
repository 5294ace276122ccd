//! Capture error types.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

/// Errors that can occur while capturing the chat window.
#[derive(thiserror::Error, Debug)]
pub enum CaptureError {
    /// Helper program was not found.
    #[error("Capture helper not found: {0}")]
    NotFound(PathBuf),

    /// Helper program did not finish in time.
    #[error("Capture helper timed out after {0:?}")]
    TimedOut(Duration),

    /// Helper program exited unsuccessfully.
    #[error("Capture helper failed ({status}): {stderr}")]
    HelperFailed { status: ExitStatus, stderr: String },

    /// Helper succeeded but wrote no screenshot.
    #[error("Capture helper produced no image at {0}")]
    MissingImage(PathBuf),

    /// Invalid extraction pattern.
    #[error("Invalid field pattern: {0}")]
    Pattern(#[from] regex::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
