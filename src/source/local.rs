//! Local message files: a single `.eml` file or a directory tree of them.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{ExtractError, Result};
use crate::export::attachment::extract_attachments;
use crate::model::attachment::Extraction;
use crate::parser::eml::{has_message_extension, read_eml};

/// Totals for a batch of message files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct BatchSummary {
    /// Message files visited.
    pub files: usize,
    /// Files that could not be read or parsed.
    pub failed_files: usize,
    /// Attachments written.
    pub attachments: usize,
    /// Attachments that qualified but could not be written.
    pub failed_attachments: usize,
}

impl BatchSummary {
    fn record(&mut self, outcome: &Result<Extraction>) {
        self.files += 1;
        match outcome {
            Ok(extraction) => {
                self.attachments += extraction.saved.len();
                self.failed_attachments += extraction.failed.len();
            }
            Err(_) => self.failed_files += 1,
        }
    }
}

/// Read one message file and extract its attachments into `output_dir`.
pub fn process_file(path: &Path, output_dir: &Path) -> Result<Extraction> {
    let raw = read_eml(path)?;
    tracing::debug!(path = %path.display(), bytes = raw.len(), "Read message file");
    extract_attachments(&raw, output_dir)
}

/// Recursively list message files under `dir`.
///
/// Matches regular files (or links to them) whose extension is one of
/// `extensions`, case-insensitively. Entries are sorted by name within each
/// directory. Unreadable entries are logged and skipped.
pub fn find_message_files(dir: &Path, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Err(ExtractError::FileNotFound(dir.to_path_buf()));
    }

    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unreadable directory entry");
                continue;
            }
        };
        if entry.file_type().is_dir() || !entry.path().is_file() {
            continue;
        }
        if has_message_extension(entry.path(), extensions) {
            files.push(entry.into_path());
        }
    }

    Ok(files)
}

/// Extract attachments from each file in turn.
///
/// `on_file` is called after every file with its outcome. A file that fails
/// to read or parse is counted and the batch moves on.
pub fn process_files(
    files: &[PathBuf],
    output_dir: &Path,
    on_file: &mut dyn FnMut(&Path, &Result<Extraction>),
) -> BatchSummary {
    let mut summary = BatchSummary::default();

    for path in files {
        let outcome = process_file(path, output_dir);
        if let Err(e) = &outcome {
            tracing::warn!(path = %path.display(), error = %e, "Failed to process message file");
        }
        summary.record(&outcome);
        on_file(path, &outcome);
    }

    summary
}

/// Extract attachments from every message file under `dir`.
pub fn process_dir(
    dir: &Path,
    output_dir: &Path,
    extensions: &[String],
    on_file: &mut dyn FnMut(&Path, &Result<Extraction>),
) -> Result<BatchSummary> {
    let files = find_message_files(dir, extensions)?;
    tracing::info!(dir = %dir.display(), count = files.len(), "Found message files");
    Ok(process_files(&files, output_dir, on_file))
}
