//! Reading individual `.eml` files (RFC 5322 messages without MBOX framing).

use std::path::Path;

use crate::error::{ExtractError, Result};

/// Read a whole message file into memory.
///
/// A missing file maps to [`ExtractError::FileNotFound`]; any other failure
/// keeps the path alongside the I/O error.
pub fn read_eml(path: impl AsRef<Path>) -> Result<Vec<u8>> {
    let path = path.as_ref();
    std::fs::read(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ExtractError::FileNotFound(path.to_path_buf())
        } else {
            ExtractError::io(path, e)
        }
    })
}

/// Whether the file name of `path` ends in `.<ext>` for one of
/// `extensions`, compared case-insensitively. A file named just `.eml`
/// counts.
pub fn has_message_extension(path: &Path, extensions: &[String]) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let name = name.to_ascii_lowercase();
    extensions
        .iter()
        .any(|ext| name.ends_with(&format!(".{}", ext.to_ascii_lowercase())))
}
