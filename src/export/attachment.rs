//! Extract attachments from raw message bytes.

use std::path::{Path, PathBuf};

use crate::error::{ExtractError, Result};
use crate::model::attachment::{Extraction, FailedAttachment, SavedAttachment};
use crate::model::part::Part;
use crate::parser::mime;

use super::filename::{sanitize_filename, unique_path};

/// Extract every attachment of a raw message into `output_dir`.
///
/// Returns the absolute paths written, in message-tree order. An empty
/// list means the message had no attachments. Parts that fail to write are
/// logged and left out; use [`extract_attachments`] to inspect them.
pub fn extract(raw_message: &[u8], output_dir: &Path) -> Result<Vec<PathBuf>> {
    Ok(extract_attachments(raw_message, output_dir)?.paths())
}

/// Extract every attachment of a raw message into `output_dir`.
///
/// Fails only when the message cannot be parsed at all. A part whose write
/// fails is recorded in [`Extraction::failed`] and the remaining parts are
/// still processed.
pub fn extract_attachments(raw_message: &[u8], output_dir: &Path) -> Result<Extraction> {
    let message = mime::parse_message(raw_message)?;
    let output_dir = std::path::absolute(output_dir).map_err(|e| ExtractError::io(output_dir, e))?;

    tracing::debug!(
        subject = message.subject().unwrap_or(""),
        output_dir = %output_dir.display(),
        "Extracting attachments"
    );

    let mut extraction = Extraction::default();
    for part in message.attachments() {
        let filename = sanitize_filename(&part.output_name());
        match save_part(&part, &output_dir, &filename) {
            Ok(saved) => {
                tracing::debug!(path = %saved.path.display(), size = saved.size, "Saved attachment");
                extraction.saved.push(saved);
            }
            Err(error) => {
                tracing::warn!(filename = %filename, error = %error, "Failed to save attachment");
                extraction.failed.push(FailedAttachment { filename, error });
            }
        }
    }

    Ok(extraction)
}

/// Write one part's payload under a collision-free name.
fn save_part(part: &Part<'_>, output_dir: &Path, filename: &str) -> Result<SavedAttachment> {
    if part.encoding_problem {
        tracing::warn!(
            filename,
            "Attachment payload could not be fully decoded, saving what was recovered"
        );
    }

    let path = unique_path(output_dir, filename);
    save_attachment(&part.payload, &path)?;

    Ok(SavedAttachment {
        path,
        size: part.payload.len() as u64,
        content_type: part.content_type.clone(),
    })
}

/// Write decoded bytes to `path`, creating or truncating the file.
pub fn save_attachment(data: &[u8], path: &Path) -> Result<()> {
    std::fs::write(path, data).map_err(|e| ExtractError::write(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(parts: &[(&str, &str)]) -> Vec<u8> {
        let mut raw = String::from(
            "From: a@example.com\r\nSubject: t\r\nMIME-Version: 1.0\r\n\
             Content-Type: multipart/mixed; boundary=\"XX\"\r\n\r\n",
        );
        for (headers, body) in parts {
            raw.push_str("--XX\r\n");
            raw.push_str(headers);
            raw.push_str("\r\n\r\n");
            raw.push_str(body);
            raw.push_str("\r\n");
        }
        raw.push_str("--XX--\r\n");
        raw.into_bytes()
    }

    #[test]
    fn test_extract_single_attachment() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = message(&[(
            "Content-Type: text/plain\r\nContent-Disposition: attachment; filename=\"hello.txt\"\r\nContent-Transfer-Encoding: base64",
            "SGVsbG8sIHdvcmxkIQ==",
        )]);

        let paths = extract(&raw, tmp.path()).unwrap();
        assert_eq!(paths, vec![tmp.path().join("hello.txt")]);
        assert_eq!(std::fs::read(&paths[0]).unwrap(), b"Hello, world!");
    }

    #[test]
    fn test_extract_text_attachment_is_byte_exact() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = message(&[(
            "Content-Type: text/csv; charset=iso-8859-1\r\nContent-Disposition: attachment; filename=\"menu.csv\"\r\nContent-Transfer-Encoding: base64",
            "Y2Fm6Q==",
        )]);

        let extraction = extract_attachments(&raw, tmp.path()).unwrap();
        assert_eq!(extraction.saved[0].size, 4);
        assert_eq!(
            std::fs::read(tmp.path().join("menu.csv")).unwrap(),
            b"caf\xE9"
        );
    }

    #[test]
    fn test_extract_embedded_message_writes_empty_file() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = message(&[(
            "Content-Type: message/rfc822\r\nContent-Disposition: attachment; filename=\"fwd.eml\"",
            "Subject: inner\r\n\r\ninner body",
        )]);

        let paths = extract(&raw, tmp.path()).unwrap();
        assert_eq!(paths, vec![tmp.path().join("fwd.eml")]);
        assert!(std::fs::read(&paths[0]).unwrap().is_empty());
    }

    #[test]
    fn test_extract_traversal_name_stays_inside() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = message(&[(
            "Content-Type: application/octet-stream\r\nContent-Disposition: attachment; filename=\"../../evil.sh\"\r\nContent-Transfer-Encoding: base64",
            "ZWNobyBoaQ==",
        )]);

        let paths = extract(&raw, tmp.path()).unwrap();
        assert_eq!(paths, vec![tmp.path().join("evil.sh")]);
        assert!(paths[0].starts_with(tmp.path()));
    }

    #[test]
    fn test_extract_unnamed_uses_subtype() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = message(&[(
            "Content-Type: application/pdf\r\nContent-Disposition: attachment\r\nContent-Transfer-Encoding: base64",
            "JVBERi0xLjQ=",
        )]);

        let extraction = extract_attachments(&raw, tmp.path()).unwrap();
        assert_eq!(extraction.saved.len(), 1);
        assert_eq!(extraction.saved[0].path, tmp.path().join("attachment.pdf"));
        assert_eq!(extraction.saved[0].size, 8);
        assert_eq!(
            extraction.saved[0].content_type.as_deref(),
            Some("application/pdf")
        );
    }

    #[test]
    fn test_extract_no_attachments() {
        let tmp = tempfile::tempdir().unwrap();
        let raw = message(&[("Content-Type: text/plain", "just text")]);

        let extraction = extract_attachments(&raw, tmp.path()).unwrap();
        assert!(extraction.is_empty());
        assert_eq!(std::fs::read_dir(tmp.path()).unwrap().count(), 0);
    }

    #[test]
    fn test_extract_does_not_overwrite_existing() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("hello.txt"), b"keep me").unwrap();
        let raw = message(&[(
            "Content-Type: text/plain\r\nContent-Disposition: attachment; filename=\"hello.txt\"\r\nContent-Transfer-Encoding: base64",
            "SGVsbG8sIHdvcmxkIQ==",
        )]);

        let paths = extract(&raw, tmp.path()).unwrap();
        assert_eq!(paths, vec![tmp.path().join("hello_1.txt")]);
        assert_eq!(std::fs::read(tmp.path().join("hello.txt")).unwrap(), b"keep me");
    }

    #[test]
    fn test_extract_missing_output_dir_reports_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let missing = tmp.path().join("does-not-exist");
        let raw = message(&[
            (
                "Content-Type: application/octet-stream\r\nContent-Disposition: attachment; filename=\"a.bin\"\r\nContent-Transfer-Encoding: base64",
                "AAEC",
            ),
            (
                "Content-Type: application/octet-stream\r\nContent-Disposition: attachment; filename=\"b.bin\"\r\nContent-Transfer-Encoding: base64",
                "AwQF",
            ),
        ]);

        let extraction = extract_attachments(&raw, &missing).unwrap();
        assert!(extraction.saved.is_empty());
        assert_eq!(extraction.failed.len(), 2);
        assert_eq!(extraction.failed[0].filename, "a.bin");
        assert_eq!(extraction.failed[1].filename, "b.bin");
        assert!(matches!(extraction.failed[0].error, ExtractError::Write { .. }));
    }

    #[test]
    fn test_extract_unparseable() {
        let tmp = tempfile::tempdir().unwrap();
        assert!(matches!(
            extract(b"", tmp.path()),
            Err(ExtractError::Parse(_))
        ));
    }
}
