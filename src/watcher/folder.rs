//! Polling folder watcher driving the rename pipeline.

use std::collections::HashMap;
use std::convert::Infallible;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use super::error::WatcherError;
use super::stability::{Stability, StabilityDetector};
use super::state::{Observation, Settle, WatchState};
use crate::capture::{CaptureOutcome, CapturedImage, MetadataBundle, MetadataCapture};
use crate::clock::Clock;
use crate::config::RenamerConfig;
use crate::renamer::{RenameOutcome, Renamer};

/// Counts from one scan iteration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Paths seen for the first time.
    pub new: usize,
    /// Processed paths whose size changed.
    pub reopened: usize,
    /// Unprocessed paths still growing.
    pub deferred: usize,
    /// Paths handed to the pipeline.
    pub processed: usize,
    /// Entries dropped because their path disappeared.
    pub removed: usize,
}

/// Watches one folder and renames files once they stop changing.
///
/// Single task, no concurrency: each detected path runs through stabilization,
/// capture and rename before the next one is considered.
pub struct FolderWatcher {
    watch_dir: PathBuf,
    output_dir: PathBuf,
    poll_interval: Duration,
    error_backoff: Duration,
    state: WatchState,
    renamer: Renamer,
    detector: StabilityDetector,
    capture: Box<dyn MetadataCapture>,
    clock: Arc<dyn Clock>,
}

impl FolderWatcher {
    /// Create a watcher from `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the renamer cannot be built.
    pub fn new(
        config: &RenamerConfig,
        capture: Box<dyn MetadataCapture>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, WatcherError> {
        Ok(Self {
            watch_dir: config.watch_dir.clone(),
            output_dir: config.output_dir.clone(),
            poll_interval: config.poll_interval(),
            error_backoff: config.error_backoff(),
            state: WatchState::new(),
            renamer: Renamer::from_config(config)?,
            detector: StabilityDetector::new(
                config.temp_marker.clone(),
                config.stability_interval(),
                config.stability_timeout(),
                Arc::clone(&clock),
            ),
            capture,
            clock,
        })
    }

    #[must_use]
    pub fn state(&self) -> &WatchState {
        &self.state
    }

    /// Check startup preconditions: the watched folder exists and the output
    /// folder can be created.
    ///
    /// # Errors
    ///
    /// Returns `WatchDirMissing` or `OutputDir`.
    pub async fn prepare(&self) -> Result<(), WatcherError> {
        match tokio::fs::metadata(&self.watch_dir).await {
            Ok(meta) if meta.is_dir() => {}
            _ => return Err(WatcherError::WatchDirMissing(self.watch_dir.clone())),
        }
        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| WatcherError::OutputDir {
                path: self.output_dir.clone(),
                source: e,
            })
    }

    /// Record every file currently in the folder as already processed.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be listed.
    pub async fn seed(&mut self) -> Result<usize, WatcherError> {
        let current = self.scan().await?;
        let now = self.clock.local_now();
        for (path, size) in current {
            self.state.seed(path, size, now);
        }
        tracing::info!(
            folder = %self.watch_dir.display(),
            existing = self.state.len(),
            "Ignoring files present at startup"
        );
        Ok(self.state.len())
    }

    /// Run one scan iteration: track new and modified files, process settled
    /// ones and forget vanished ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the folder cannot be listed. Per-file failures are
    /// logged and do not fail the iteration.
    pub async fn scan_once(&mut self) -> Result<ScanReport, WatcherError> {
        let current = self.scan().await?;
        let now = self.clock.local_now();
        let mut report = ScanReport::default();

        let mut paths: Vec<(&PathBuf, &u64)> = current.iter().collect();
        paths.sort();
        for (path, &size) in paths {
            match self.state.observe(path, size, now) {
                Observation::New => report.new += 1,
                Observation::Reopened => report.reopened += 1,
                Observation::Empty | Observation::Known => {}
            }
        }

        for path in self.state.pending() {
            let Some(&size) = current.get(&path) else {
                continue;
            };
            if self.state.settle(&path, size) == Settle::Growing {
                report.deferred += 1;
                continue;
            }

            self.process(&path).await;
            self.state.mark_processed(&path);
            report.processed += 1;
        }

        report.removed = self.state.retain_present(&current).len();
        Ok(report)
    }

    /// Watch forever.
    ///
    /// Only startup failures are returned. Errors inside an iteration are
    /// logged and followed by a longer backoff.
    ///
    /// # Errors
    ///
    /// Returns an error if the watched folder is missing, the output folder
    /// cannot be created, or the initial scan fails.
    pub async fn run(&mut self) -> Result<Infallible, WatcherError> {
        self.prepare().await?;
        self.seed().await?;
        tracing::info!(
            folder = %self.watch_dir.display(),
            output = %self.output_dir.display(),
            "Watching for new attachments"
        );

        loop {
            match self.scan_once().await {
                Ok(report) => {
                    if report != ScanReport::default() {
                        tracing::debug!(?report, "Scan complete");
                    }
                    self.clock.sleep(self.poll_interval).await;
                }
                Err(e) => {
                    tracing::error!(error = %e, "Error while watching folder");
                    self.clock.sleep(self.error_backoff).await;
                }
            }
        }
    }

    async fn process(&self, path: &Path) {
        let is_temporary = path
            .file_name()
            .is_some_and(|n| n.to_string_lossy().contains(self.detector.marker()));

        if is_temporary {
            tracing::info!(path = %path.display(), "Temporary file detected");
            match self.detector.await_stable(path).await {
                Stability::Stable(final_path) => self.rename_final(&final_path).await,
                Stability::TimedOut(_) => {}
            }
        } else {
            self.rename_final(path).await;
        }
    }

    async fn rename_final(&self, path: &Path) {
        let wants_name = path
            .file_name()
            .is_some_and(|n| self.renamer.skip_reason(&n.to_string_lossy()).is_none());
        let captured = if wants_name {
            self.capture_metadata().await
        } else {
            None
        };

        let now = self.clock.local_now();
        let bundle = captured.as_ref().map(|(bundle, _)| bundle);
        match self.renamer.rename(path, bundle, now).await {
            Ok(RenameOutcome::Renamed { .. }) => {
                if let Some((bundle, image)) = &captured {
                    if let Err(e) = self.renamer.save_audit_copy(bundle, image, now).await {
                        tracing::warn!(error = %e, "Failed to save audit screenshot");
                    }
                }
            }
            Ok(RenameOutcome::Unchanged(_) | RenameOutcome::Skipped(_)) => {}
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "Error renaming file");
            }
        }
    }

    async fn capture_metadata(&self) -> Option<(MetadataBundle, CapturedImage)> {
        match self.capture.capture().await {
            CaptureOutcome::Captured(image) => match self.capture.extract(&image) {
                Some(bundle) => {
                    tracing::debug!(?bundle, "Recognized metadata");
                    Some((bundle, image))
                }
                None => {
                    tracing::info!("No fields recognized, naming from filename");
                    None
                }
            },
            CaptureOutcome::Unavailable => None,
            CaptureOutcome::Failed(e) => {
                tracing::warn!(error = %e, "Metadata capture failed, naming from filename");
                None
            }
        }
    }

    /// Sizes of the regular files in the watched folder.
    async fn scan(&self) -> Result<HashMap<PathBuf, u64>, WatcherError> {
        let scan_err = |e: std::io::Error| WatcherError::Scan {
            path: self.watch_dir.clone(),
            source: e,
        };
        let mut dir = tokio::fs::read_dir(&self.watch_dir).await.map_err(scan_err)?;
        let mut files = HashMap::new();

        while let Some(entry) = dir.next_entry().await.map_err(scan_err)? {
            // Entries can vanish between listing and stat.
            match entry.metadata().await {
                Ok(meta) if meta.is_file() => {
                    files.insert(entry.path(), meta.len());
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(path = %entry.path().display(), error = %e, "Skipping entry");
                }
            }
        }

        Ok(files)
    }
}

impl std::fmt::Debug for FolderWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FolderWatcher")
            .field("watch_dir", &self.watch_dir)
            .field("output_dir", &self.output_dir)
            .field("poll_interval", &self.poll_interval)
            .field("tracked", &self.state.len())
            .finish_non_exhaustive()
    }
}
