//! Capture through an external helper program.
//!
//! The helper focuses the chat window, saves a screenshot to the path it
//! receives as its last argument and prints the recognized text on stdout.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use tokio::process::Command;

use super::{
    CaptureError, CaptureOutcome, CapturedImage, FieldExtractor, MetadataBundle, MetadataCapture,
};
use crate::config::CaptureConfig;

/// [`MetadataCapture`] backed by a configured helper program.
#[derive(Debug)]
pub struct CommandCapture {
    config: CaptureConfig,
    extractor: FieldExtractor,
    scratch_dir: PathBuf,
    sequence: AtomicU64,
}

impl CommandCapture {
    /// Create a capture that writes scratch screenshots to the system temp dir.
    ///
    /// # Errors
    ///
    /// Returns an error if the field extractor cannot be built.
    pub fn new(config: CaptureConfig, currency: &str) -> Result<Self, CaptureError> {
        Ok(Self {
            config,
            extractor: FieldExtractor::new(currency)?,
            scratch_dir: std::env::temp_dir(),
            sequence: AtomicU64::new(0),
        })
    }

    /// Use a specific directory for scratch screenshots.
    #[must_use]
    pub fn with_scratch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.scratch_dir = dir.into();
        self
    }

    fn scratch_path(&self) -> PathBuf {
        let n = self.sequence.fetch_add(1, Ordering::Relaxed);
        self.scratch_dir
            .join(format!("attachment-renamer-{}-{n}.png", std::process::id()))
    }

    async fn run_helper(&self, shot: &Path) -> Result<CapturedImage, CaptureError> {
        let mut cmd = Command::new(&self.config.program);
        cmd.args(&self.config.args)
            .arg(shot)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => CaptureError::NotFound(self.config.program.clone()),
            _ => CaptureError::Io(e),
        })?;

        let output = tokio::time::timeout(self.config.timeout(), child.wait_with_output())
            .await
            .map_err(|_| CaptureError::TimedOut(self.config.timeout()))??;

        if !output.status.success() {
            return Err(CaptureError::HelperFailed {
                status: output.status,
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let bytes = match tokio::fs::read(shot).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(CaptureError::MissingImage(shot.to_path_buf())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CaptureError::MissingImage(shot.to_path_buf()));
            }
            Err(e) => return Err(CaptureError::Io(e)),
        };

        Ok(CapturedImage {
            bytes,
            text: String::from_utf8_lossy(&output.stdout).into_owned(),
        })
    }
}

#[async_trait]
impl MetadataCapture for CommandCapture {
    async fn capture(&self) -> CaptureOutcome {
        let shot = self.scratch_path();
        tracing::debug!(
            program = %self.config.program.display(),
            screenshot = %shot.display(),
            "Running capture helper"
        );

        let result = self.run_helper(&shot).await;

        if let Err(e) = tokio::fs::remove_file(&shot).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %shot.display(), error = %e, "Failed to remove scratch screenshot");
            }
        }

        match result {
            Ok(image) => CaptureOutcome::Captured(image),
            Err(e) => CaptureOutcome::Failed(e),
        }
    }

    fn extract(&self, image: &CapturedImage) -> Option<MetadataBundle> {
        self.extractor.extract(&image.text)
    }
}
