//! Waiting for a temporary download to turn into a finished file.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use crate::clock::Clock;

/// Size and modification time of a file at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileSample {
    pub len: u64,
    pub modified: Option<SystemTime>,
}

impl FileSample {
    /// Sample `path`. `None` if it is missing or not a regular file.
    pub async fn take(path: &Path) -> Option<Self> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Some(Self {
                len: meta.len(),
                modified: meta.modified().ok(),
            }),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "Cannot stat file");
                None
            }
        }
    }
}

/// Outcome of [`StabilityDetector::await_stable`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stability {
    /// The finished file exists and stopped changing.
    Stable(PathBuf),
    /// The finished file never settled before the deadline.
    TimedOut(PathBuf),
}

/// Finished-file path for a temporary download path.
///
/// The marker is removed from the end of the name when it is a suffix,
/// otherwise its last occurrence is removed. Returns `None` when the name
/// does not contain the marker or nothing would remain.
#[must_use]
pub fn candidate_path(temp_path: &Path, marker: &str) -> Option<PathBuf> {
    if marker.is_empty() {
        return None;
    }
    let name = temp_path.file_name()?.to_str()?;
    let stripped = match name.strip_suffix(marker) {
        Some(stem) => stem.to_string(),
        None => {
            let at = name.rfind(marker)?;
            format!("{}{}", &name[..at], &name[at + marker.len()..])
        }
    };
    if stripped.is_empty() {
        return None;
    }
    Some(temp_path.with_file_name(stripped))
}

/// Polls a finished-file candidate until two samples one interval apart match.
pub struct StabilityDetector {
    marker: String,
    interval: Duration,
    timeout: Duration,
    clock: Arc<dyn Clock>,
}

impl StabilityDetector {
    #[must_use]
    pub fn new(
        marker: impl Into<String>,
        interval: Duration,
        timeout: Duration,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            marker: marker.into(),
            interval,
            timeout,
            clock,
        }
    }

    #[must_use]
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Block until the file `temp_path` turns into is stable, or time runs out.
    ///
    /// The timeout is measured from this call and applies whether or not the
    /// candidate exists yet.
    pub async fn await_stable(&self, temp_path: &Path) -> Stability {
        let candidate = candidate_path(temp_path, &self.marker)
            .unwrap_or_else(|| temp_path.to_path_buf());
        let deadline = self.clock.now() + self.timeout;

        loop {
            if let Some(first) = FileSample::take(&candidate).await {
                self.clock.sleep(self.interval).await;
                if FileSample::take(&candidate).await == Some(first) {
                    tracing::info!(path = %candidate.display(), "Final file found and stable");
                    return Stability::Stable(candidate);
                }
                tracing::debug!(path = %candidate.display(), "File still being written");
            } else {
                tracing::trace!(path = %candidate.display(), "Final file not present yet");
            }

            if self.clock.now() >= deadline {
                tracing::warn!(
                    path = %candidate.display(),
                    timeout = ?self.timeout,
                    "Timed out waiting for final file"
                );
                return Stability::TimedOut(candidate);
            }

            self.clock.sleep(self.interval).await;
        }
    }
}

impl std::fmt::Debug for StabilityDetector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StabilityDetector")
            .field("marker", &self.marker)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}
