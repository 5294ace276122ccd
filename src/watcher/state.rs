//! Per-path tracking state.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

/// What the watcher knows about one path in the folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntry {
    pub path: PathBuf,
    /// Terminal for this path unless its size changes again.
    pub processed: bool,
    pub detected_at: NaiveDateTime,
    /// Size seen on the previous settle check. Zero until first checked.
    pub last_known_size: u64,
}

/// Result of recording a path seen during a scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// Empty file, not tracked yet.
    Empty,
    /// First time this path was seen.
    New,
    /// A processed path changed size and needs processing again.
    Reopened,
    /// Nothing new.
    Known,
}

/// Result of checking an unprocessed path for growth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settle {
    /// Size changed since the last check; try again next scan.
    Growing,
    /// Same size as the last check.
    Ready,
}

/// Path to entry mapping owned by the watcher loop.
#[derive(Debug, Default)]
pub struct WatchState {
    entries: HashMap<PathBuf, TrackedEntry>,
}

impl WatchState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a path that existed before watching started. It is never processed
    /// unless its size changes.
    pub fn seed(&mut self, path: PathBuf, size: u64, now: NaiveDateTime) {
        self.entries.insert(
            path.clone(),
            TrackedEntry {
                path,
                processed: true,
                detected_at: now,
                last_known_size: size,
            },
        );
    }

    /// Record `path` with its current `size` from a scan.
    pub fn observe(&mut self, path: &Path, size: u64, now: NaiveDateTime) -> Observation {
        if size == 0 {
            return Observation::Empty;
        }

        match self.entries.get_mut(path) {
            None => {
                self.entries.insert(
                    path.to_path_buf(),
                    TrackedEntry {
                        path: path.to_path_buf(),
                        processed: false,
                        detected_at: now,
                        last_known_size: 0,
                    },
                );
                tracing::info!(path = %path.display(), size, "New file detected");
                Observation::New
            }
            Some(entry) if entry.processed && entry.last_known_size != size => {
                entry.processed = false;
                tracing::info!(
                    path = %path.display(),
                    old_size = entry.last_known_size,
                    new_size = size,
                    "Processed file modified, reopening"
                );
                Observation::Reopened
            }
            Some(_) => Observation::Known,
        }
    }

    /// Compare `size` against the stored size, storing it if it changed.
    ///
    /// Untracked paths report `Growing` so they are never processed. An
    /// empty file is never ready and restarts the size comparison.
    pub fn settle(&mut self, path: &Path, size: u64) -> Settle {
        let Some(entry) = self.entries.get_mut(path) else {
            return Settle::Growing;
        };
        if size == 0 {
            entry.last_known_size = 0;
            return Settle::Growing;
        }
        if entry.last_known_size == size {
            return Settle::Ready;
        }
        tracing::debug!(
            path = %path.display(),
            old_size = entry.last_known_size,
            new_size = size,
            "File still growing"
        );
        entry.last_known_size = size;
        Settle::Growing
    }

    pub fn mark_processed(&mut self, path: &Path) {
        if let Some(entry) = self.entries.get_mut(path) {
            entry.processed = true;
        }
    }

    /// Unprocessed paths in a stable order.
    #[must_use]
    pub fn pending(&self) -> Vec<PathBuf> {
        let mut paths: Vec<PathBuf> = self
            .entries
            .values()
            .filter(|e| !e.processed)
            .map(|e| e.path.clone())
            .collect();
        paths.sort();
        paths
    }

    /// Drop entries for paths absent from `present`. Returns the removed paths.
    pub fn retain_present<V>(&mut self, present: &HashMap<PathBuf, V>) -> Vec<PathBuf> {
        let mut removed = Vec::new();
        self.entries.retain(|path, _| {
            let keep = present.contains_key(path);
            if !keep {
                removed.push(path.clone());
            }
            keep
        });
        for path in &removed {
            tracing::debug!(path = %path.display(), "File gone, no longer tracked");
        }
        removed
    }

    #[must_use]
    pub fn get(&self, path: &Path) -> Option<&TrackedEntry> {
        self.entries.get(path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
