//! Folder watcher for finished chat attachments.
//!
//! Polls the download folder, waits for files to stop growing and hands
//! them to the [`Renamer`](crate::renamer::Renamer).

mod error;
mod folder;
mod stability;
mod state;

pub use error::WatcherError;
pub use folder::{FolderWatcher, ScanReport};
pub use stability::{candidate_path, FileSample, Stability, StabilityDetector};
pub use state::{Observation, Settle, TrackedEntry, WatchState};
