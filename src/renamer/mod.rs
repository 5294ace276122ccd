//! Renaming of finished downloads into the structured naming scheme.

mod error;
pub mod naming;

use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use regex::Regex;

pub use error::RenameError;

use crate::capture::{CapturedImage, MetadataBundle};
use crate::config::RenamerConfig;

/// Why a file was left alone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Filename still carries the temporary marker.
    TemporaryMarker,
    /// Filename already contains a canonical date stamp.
    AlreadyCanonical,
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TemporaryMarker => write!(f, "temporary download"),
            Self::AlreadyCanonical => write!(f, "already renamed"),
        }
    }
}

/// Successful result of [`Renamer::rename`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenameOutcome {
    /// File moved to its new name.
    Renamed { from: PathBuf, to: PathBuf },
    /// Destination equals source, nothing to do.
    Unchanged(PathBuf),
    /// File is not a rename subject.
    Skipped(SkipReason),
}

/// Computes target names and moves files into the output folder.
#[derive(Debug, Clone)]
pub struct Renamer {
    output_dir: PathBuf,
    debug_dir: PathBuf,
    temp_marker: String,
    canonical: Regex,
}

impl Renamer {
    /// Create a renamer writing to `output_dir`.
    ///
    /// # Errors
    ///
    /// Returns an error if the canonical stamp pattern fails to compile.
    pub fn new(
        output_dir: impl Into<PathBuf>,
        debug_dir: impl Into<PathBuf>,
        temp_marker: impl Into<String>,
    ) -> Result<Self, RenameError> {
        Ok(Self {
            output_dir: output_dir.into(),
            debug_dir: debug_dir.into(),
            temp_marker: temp_marker.into(),
            canonical: Regex::new(naming::CANONICAL_STAMP_PATTERN)?,
        })
    }

    /// Create a renamer from the output settings of `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the canonical stamp pattern fails to compile.
    pub fn from_config(config: &RenamerConfig) -> Result<Self, RenameError> {
        Self::new(&config.output_dir, config.debug_dir(), &config.temp_marker)
    }

    /// Reason to leave `file_name` untouched, if any.
    #[must_use]
    pub fn skip_reason(&self, file_name: &str) -> Option<SkipReason> {
        if file_name.contains(&self.temp_marker) {
            Some(SkipReason::TemporaryMarker)
        } else if self.canonical.is_match(file_name) {
            Some(SkipReason::AlreadyCanonical)
        } else {
            None
        }
    }

    /// Destination path for `source`, without touching the filesystem.
    #[must_use]
    pub fn target_path(
        &self,
        source: &Path,
        metadata: Option<&MetadataBundle>,
        now: NaiveDateTime,
    ) -> PathBuf {
        let name = match metadata {
            Some(bundle) => naming::metadata_name(bundle, &naming::extension_of(source), now),
            None => naming::filename_name(source, now),
        };
        self.output_dir.join(name)
    }

    /// Rename `path` into the output folder.
    ///
    /// Files carrying the temporary marker or a canonical date stamp are
    /// skipped. A destination occupied by another file is an error; nothing
    /// is overwritten.
    ///
    /// # Errors
    ///
    /// Returns an error if the output directory cannot be created, the
    /// destination exists or cannot be checked, or the move fails.
    pub async fn rename(
        &self,
        path: &Path,
        metadata: Option<&MetadataBundle>,
        now: NaiveDateTime,
    ) -> Result<RenameOutcome, RenameError> {
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| RenameError::NoFileName(path.to_path_buf()))?;

        let target = self.target_path(path, metadata, now);
        if target == path {
            tracing::info!(path = %path.display(), "File already has the correct name");
            return Ok(RenameOutcome::Unchanged(target));
        }

        if let Some(reason) = self.skip_reason(&file_name) {
            tracing::info!(path = %path.display(), %reason, "Skipping file");
            return Ok(RenameOutcome::Skipped(reason));
        }

        tokio::fs::create_dir_all(&self.output_dir)
            .await
            .map_err(|e| RenameError::CreateDir {
                path: self.output_dir.clone(),
                source: e,
            })?;

        let occupied = tokio::fs::try_exists(&target)
            .await
            .map_err(|e| RenameError::CheckDestination {
                path: target.clone(),
                source: e,
            })?;
        if occupied {
            return Err(RenameError::DestinationExists {
                from: path.to_path_buf(),
                to: target,
            });
        }

        tokio::fs::rename(path, &target)
            .await
            .map_err(|e| RenameError::Move {
                from: path.to_path_buf(),
                to: target.clone(),
                source: e,
            })?;

        tracing::info!(
            from = %path.display(),
            to = %target.display(),
            "Renamed file"
        );
        Ok(RenameOutcome::Renamed {
            from: path.to_path_buf(),
            to: target,
        })
    }

    /// Write the captured screenshot next to the renamed files for auditing.
    ///
    /// # Errors
    ///
    /// Returns an error if the debug directory or the image cannot be written.
    pub async fn save_audit_copy(
        &self,
        bundle: &MetadataBundle,
        image: &CapturedImage,
        captured_at: NaiveDateTime,
    ) -> Result<PathBuf, RenameError> {
        tokio::fs::create_dir_all(&self.debug_dir)
            .await
            .map_err(|e| RenameError::CreateDir {
                path: self.debug_dir.clone(),
                source: e,
            })?;

        // Same fields as the renamed file, stamped with the capture time.
        let stamped = MetadataBundle {
            date_time: naming::timestamp(captured_at),
            ..bundle.clone()
        };
        let path = self
            .debug_dir
            .join(naming::metadata_name(&stamped, ".png", captured_at));

        tokio::fs::write(&path, &image.bytes)
            .await
            .map_err(|e| RenameError::AuditCopy {
                path: path.clone(),
                source: e,
            })?;

        tracing::debug!(path = %path.display(), "Saved audit screenshot");
        Ok(path)
    }
}
