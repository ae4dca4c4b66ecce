//! Results of extracting attachments from one message.
//!
//! Only metadata lives here. The bytes themselves are owned by the
//! filesystem once written.

use std::path::PathBuf;

use crate::error::ExtractError;

/// An attachment that was written to disk.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SavedAttachment {
    /// Absolute path of the written file, always inside the output directory.
    pub path: PathBuf,

    /// Number of bytes written.
    pub size: u64,

    /// Declared MIME content type (e.g. `"application/pdf"`), if any.
    pub content_type: Option<String>,
}

/// An attachment-qualifying part that could not be saved.
#[derive(Debug)]
pub struct FailedAttachment {
    /// Sanitized filename the part would have been saved under.
    pub filename: String,

    /// Why saving failed.
    pub error: ExtractError,
}

/// Outcome of extracting every attachment of a single message.
#[derive(Debug, Default)]
pub struct Extraction {
    /// Saved attachments, in message-tree traversal order.
    pub saved: Vec<SavedAttachment>,

    /// Parts that qualified but could not be written.
    pub failed: Vec<FailedAttachment>,
}

impl Extraction {
    /// Paths of the saved attachments, in traversal order.
    pub fn paths(&self) -> Vec<PathBuf> {
        self.saved.iter().map(|a| a.path.clone()).collect()
    }

    /// `true` when the message had no attachment-qualifying parts.
    pub fn is_empty(&self) -> bool {
        self.saved.is_empty() && self.failed.is_empty()
    }
}
