//! Safe on-disk names for attachments.
//!
//! Declared filenames come straight from the message and may contain path
//! separators, traversal sequences or arbitrary unicode. [`sanitize_filename`]
//! reduces them to a plain basename and [`unique_path`] makes sure nothing
//! already in the output directory is overwritten.

use std::path::{Path, PathBuf};

/// Name used when nothing usable survives sanitizing.
pub const FALLBACK_NAME: &str = "attachment";

/// Reduce an arbitrary filename to a safe basename.
///
/// Keeps only the part after the last `/` and replaces every character
/// outside `[A-Za-z0-9._-]` with `_`. Returns [`FALLBACK_NAME`] if the result
/// is empty, has no safe character at all, or is `.` / `..`.
pub fn sanitize_filename(name: &str) -> String {
    let basename = name.rsplit('/').next().unwrap_or("");

    let mut any_safe = false;
    let sanitized: String = basename
        .chars()
        .map(|c| {
            if is_safe_char(c) {
                any_safe = true;
                c
            } else {
                '_'
            }
        })
        .collect();

    if !any_safe || sanitized == "." || sanitized == ".." {
        FALLBACK_NAME.to_string()
    } else {
        sanitized
    }
}

fn is_safe_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-'
}

/// Split a filename into stem and extension (the extension keeps its dot).
///
/// The last dot starts the extension, except when only dots precede it, so
/// `.bashrc` has no extension.
pub fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) if !name[..pos].chars().all(|c| c == '.') => name.split_at(pos),
        _ => (name, ""),
    }
}

/// Return `dir/name`, or `dir/stem_N.ext` for the smallest `N >= 1` that is
/// free.
///
/// `name` must already be sanitized. Probing does not follow symlinks, so a
/// dangling link counts as taken. Nothing is created here; the caller writes
/// to the returned path.
pub fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if !is_taken(&path) {
        return path;
    }

    let (stem, ext) = split_extension(name);
    let mut counter: u64 = 1;
    loop {
        let candidate = dir.join(format!("{stem}_{counter}{ext}"));
        if !is_taken(&candidate) {
            return candidate;
        }
        counter += 1;
    }
}

fn is_taken(path: &Path) -> bool {
    path.symlink_metadata().is_ok()
}
