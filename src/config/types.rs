//! Configuration types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::ConfigError;

/// External helper used to capture the chat window and recognize its text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CaptureConfig {
    /// Program to run. Receives the screenshot destination as its last argument.
    pub program: PathBuf,
    /// Extra arguments passed before the screenshot path.
    #[serde(default)]
    pub args: Vec<String>,
    /// How long the helper may run before it is killed.
    #[serde(default = "default_capture_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_capture_timeout_ms() -> u64 {
    10_000
}

impl CaptureConfig {
    /// Create a capture config for a program with default timeout and no args.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            timeout_ms: default_capture_timeout_ms(),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Configuration for the attachment renamer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RenamerConfig {
    /// Folder where the chat application drops downloads.
    pub watch_dir: PathBuf,
    /// Folder receiving renamed files.
    pub output_dir: PathBuf,
    /// Delay between folder scans.
    pub poll_interval_ms: u64,
    /// Delay between two stability samples of a finishing download.
    pub stability_interval_ms: u64,
    /// Total time to wait for a temporary download to settle.
    pub stability_timeout_ms: u64,
    /// Delay after a failed scan iteration.
    pub error_backoff_ms: u64,
    /// Filename suffix used by the downloader for files still being written.
    pub temp_marker: String,
    /// Subdirectory of `output_dir` holding audit screenshots.
    pub debug_subdir: String,
    /// Currency code prefixed to recognized amounts.
    pub currency: String,
    /// Optional metadata capture helper.
    pub capture: Option<CaptureConfig>,
}

impl Default for RenamerConfig {
    fn default() -> Self {
        Self {
            watch_dir: PathBuf::from("downloads"),
            output_dir: PathBuf::from("renamed"),
            poll_interval_ms: 2_000,
            stability_interval_ms: 1_000,
            stability_timeout_ms: 30_000,
            error_backoff_ms: 5_000,
            temp_marker: "_tmp".to_string(),
            debug_subdir: "debug_screenshots".to_string(),
            currency: "MVR".to_string(),
            capture: None,
        }
    }
}

impl RenamerConfig {
    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    #[must_use]
    pub fn stability_interval(&self) -> Duration {
        Duration::from_millis(self.stability_interval_ms)
    }

    #[must_use]
    pub fn stability_timeout(&self) -> Duration {
        Duration::from_millis(self.stability_timeout_ms)
    }

    #[must_use]
    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    /// Directory where audit screenshots are written.
    #[must_use]
    pub fn debug_dir(&self) -> PathBuf {
        self.output_dir.join(&self.debug_subdir)
    }

    /// Check values that would make the watch loop spin or misbehave.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` naming the offending field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let intervals = [
            ("poll_interval_ms", self.poll_interval_ms),
            ("stability_interval_ms", self.stability_interval_ms),
            ("stability_timeout_ms", self.stability_timeout_ms),
            ("error_backoff_ms", self.error_backoff_ms),
        ];
        for (field, value) in intervals {
            if value == 0 {
                return Err(ConfigError::Invalid {
                    field,
                    reason: "must be greater than zero".to_string(),
                });
            }
        }
        if self.temp_marker.is_empty() {
            return Err(ConfigError::Invalid {
                field: "temp_marker",
                reason: "must not be empty".to_string(),
            });
        }
        if self.capture.as_ref().is_some_and(|c| c.timeout_ms == 0) {
            return Err(ConfigError::Invalid {
                field: "capture.timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}
