//! Attachment Renamer - renames finished chat downloads into structured names.

pub mod capture;
pub mod clock;
pub mod config;
pub mod display;
pub mod renamer;
pub mod watcher;
