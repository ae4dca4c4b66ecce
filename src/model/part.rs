//! One node of a message's MIME tree, as seen by the extractor.

use std::borrow::Cow;

/// Value of a part's `Content-Disposition` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Disposition {
    /// `attachment`
    Attachment,
    /// `inline`
    Inline,
    /// Any other token. Kept verbatim (lowercased).
    Other(String),
    /// No `Content-Disposition` header at all.
    Absent,
}

impl Disposition {
    /// Classify a raw disposition token, case-insensitively.
    pub fn from_token(token: &str) -> Self {
        let token = token.trim();
        if token.eq_ignore_ascii_case("attachment") {
            Self::Attachment
        } else if token.eq_ignore_ascii_case("inline") {
            Self::Inline
        } else {
            Self::Other(token.to_ascii_lowercase())
        }
    }
}

/// A MIME part flattened out of the parsed tree.
///
/// Borrows its payload from the parsed message where the bytes are already
/// decoded, so a `Part` never outlives the
/// [`Message`](crate::parser::mime::Message) it came from.
#[derive(Debug, Clone)]
pub struct Part<'a> {
    /// Content disposition of this part.
    pub disposition: Disposition,

    /// Declared filename (`Content-Disposition: filename`, falling back to
    /// `Content-Type: name`).
    pub filename: Option<String>,

    /// Full content type (e.g. `"application/pdf"`), if declared.
    pub content_type: Option<String>,

    /// Lowercased content subtype (e.g. `"pdf"`). `None` when the part
    /// declares a content type without a subtype.
    pub subtype: Option<String>,

    /// Payload after transfer decoding, with no charset conversion. Empty for
    /// multipart containers and embedded messages.
    pub payload: Cow<'a, [u8]>,

    /// Nesting depth in the tree (root is 0).
    pub depth: usize,

    /// Set when the parser could not cleanly decode the transfer encoding.
    pub encoding_problem: bool,
}

impl Part<'_> {
    /// Whether this part should be saved as an attachment.
    ///
    /// True for an explicit `attachment` disposition, and for any part that
    /// carries a non-empty filename regardless of disposition (this picks up
    /// named inline images as well).
    pub fn is_attachment(&self) -> bool {
        self.disposition == Disposition::Attachment || self.declared_filename().is_some()
    }

    /// The declared filename, ignoring empty values.
    pub fn declared_filename(&self) -> Option<&str> {
        self.filename.as_deref().filter(|name| !name.is_empty())
    }

    /// Filename to save this part under, before sanitizing.
    ///
    /// Uses the declared filename when present, otherwise
    /// `attachment.<subtype>` (`attachment.bin` without a subtype).
    pub fn output_name(&self) -> String {
        match self.declared_filename() {
            Some(name) => name.to_string(),
            None => format!("attachment.{}", self.subtype.as_deref().unwrap_or("bin")),
        }
    }
}
