//! Metadata capture side channel.
//!
//! Screen capture and text recognition are platform specific, so the watcher
//! only sees the [`MetadataCapture`] capability. Every failure here degrades
//! to filename-based naming.

mod command;
mod error;
mod fields;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use command::CommandCapture;
pub use error::CaptureError;
pub use fields::{FieldExtractor, ReceiptFields, SUCCESS_TAG};

use crate::config::RenamerConfig;

/// Structured fields recovered from the chat window.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataBundle {
    /// Name of the chat contact.
    pub contact_name: String,
    /// Ordered detail tags (amount, identifiers, status).
    pub detail_tags: Vec<String>,
    /// Transaction date and time as recognized.
    pub date_time: String,
}

impl MetadataBundle {
    #[must_use]
    pub fn new(
        contact_name: impl Into<String>,
        detail_tags: Vec<String>,
        date_time: impl Into<String>,
    ) -> Self {
        Self {
            contact_name: contact_name.into(),
            detail_tags,
            date_time: date_time.into(),
        }
    }
}

/// A screenshot together with the text recognized in it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CapturedImage {
    /// Encoded image bytes (PNG).
    pub bytes: Vec<u8>,
    /// Recognized text, empty when recognition produced nothing.
    pub text: String,
}

/// Result of a capture attempt.
#[derive(Debug)]
pub enum CaptureOutcome {
    /// The window was captured.
    Captured(CapturedImage),
    /// No capture mechanism is configured.
    Unavailable,
    /// Capture was attempted and failed.
    Failed(CaptureError),
}

/// Capability that grabs the chat window and extracts metadata from it.
#[async_trait]
pub trait MetadataCapture: Send + Sync {
    /// Bring the chat window forward and capture it.
    async fn capture(&self) -> CaptureOutcome;

    /// Pull structured fields out of a capture. `None` when nothing was recognized.
    fn extract(&self, image: &CapturedImage) -> Option<MetadataBundle>;
}

/// Capture capability used when no helper is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCapture;

#[async_trait]
impl MetadataCapture for NoCapture {
    async fn capture(&self) -> CaptureOutcome {
        CaptureOutcome::Unavailable
    }

    fn extract(&self, _image: &CapturedImage) -> Option<MetadataBundle> {
        None
    }
}

/// Build the capture capability selected by `config`.
///
/// # Errors
///
/// Returns an error if the configured helper's field extractor cannot be built.
pub fn from_config(config: &RenamerConfig) -> Result<Box<dyn MetadataCapture>, CaptureError> {
    match &config.capture {
        Some(capture) => Ok(Box::new(CommandCapture::new(
            capture.clone(),
            &config.currency,
        )?)),
        None => Ok(Box::new(NoCapture)),
    }
}
