//! MIME message parsing and part-tree traversal.

use std::borrow::Cow;

use mail_parser::decoders::base64::base64_decode;
use mail_parser::decoders::quoted_printable::quoted_printable_decode;
use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};

use crate::error::{ExtractError, Result};
use crate::model::part::{Disposition, Part};

/// A parsed message. Read-only; borrows the raw bytes it was parsed from.
pub struct Message<'x> {
    inner: mail_parser::Message<'x>,
}

/// Parse raw message bytes into a [`Message`].
///
/// Uses `mail-parser`, which tolerates malformed headers and truncated
/// bodies. Only input with no message at all is rejected.
pub fn parse_message(raw_message: &[u8]) -> Result<Message<'_>> {
    let message_bytes = skip_from_line(raw_message);
    if message_bytes.iter().all(u8::is_ascii_whitespace) {
        return Err(ExtractError::Parse("message is empty".into()));
    }

    MessageParser::default()
        .parse(message_bytes)
        .map(|inner| Message { inner })
        .ok_or_else(|| ExtractError::Parse("no MIME structure found".into()))
}

impl<'x> Message<'x> {
    /// Decoded `Subject` header, if any.
    pub fn subject(&self) -> Option<&str> {
        self.inner.subject()
    }

    /// Every part of the tree in pre-order, depth-first.
    ///
    /// Descends into multipart children and into embedded `message/rfc822`
    /// messages. The root part comes first. Nesting depth is unbounded; the
    /// walk keeps its own stack.
    pub fn parts(&self) -> Vec<Part<'_>> {
        let mut parts = Vec::new();
        let mut pending = vec![Pending {
            msg: &self.inner,
            id: 0,
            depth: 0,
            in_digest: false,
        }];

        while let Some(next) = pending.pop() {
            let Some(part) = next.msg.part(next.id) else {
                continue;
            };
            parts.push(describe(next.msg, part, next.depth, next.in_digest));

            match &part.body {
                PartType::Multipart(children) => {
                    let digest = part.content_type().is_some_and(|ct| {
                        ct.ctype().eq_ignore_ascii_case("multipart")
                            && ct.subtype().is_some_and(|s| s.eq_ignore_ascii_case("digest"))
                    });
                    // reversed so the first child is popped first
                    pending.extend(children.iter().rev().map(|&id| Pending {
                        msg: next.msg,
                        id,
                        depth: next.depth + 1,
                        in_digest: digest,
                    }));
                }
                PartType::Message(nested) => pending.push(Pending {
                    msg: nested,
                    id: 0,
                    depth: next.depth + 1,
                    in_digest: false,
                }),
                _ => {}
            }
        }

        parts
    }

    /// Only the parts that qualify as attachments, in traversal order.
    pub fn attachments(&self) -> Vec<Part<'_>> {
        self.parts().into_iter().filter(|p| p.is_attachment()).collect()
    }
}

/// A part still waiting to be visited by [`Message::parts`].
struct Pending<'a, 'x> {
    msg: &'a mail_parser::Message<'x>,
    id: usize,
    depth: usize,
    in_digest: bool,
}

/// Flatten one `mail-parser` part into our [`Part`].
///
/// `msg` is the message (top-level or embedded) whose part list holds `part`.
fn describe<'a>(
    msg: &'a mail_parser::Message<'_>,
    part: &'a MessagePart<'_>,
    depth: usize,
    in_digest: bool,
) -> Part<'a> {
    let disposition = part
        .content_disposition()
        .map(|cd| Disposition::from_token(cd.ctype()))
        .unwrap_or(Disposition::Absent);

    let (content_type, subtype) = match part.content_type() {
        Some(ct) => {
            let main = ct.ctype().to_ascii_lowercase();
            let sub = ct.subtype().map(|s| s.to_ascii_lowercase());
            let full = match &sub {
                Some(sub) => format!("{main}/{sub}"),
                None => main,
            };
            (Some(full), sub)
        }
        // RFC 2046 defaults when no Content-Type is present
        None if in_digest => (None, Some("rfc822".to_string())),
        None => (None, Some("plain".to_string())),
    };

    let payload: Cow<'a, [u8]> = match &part.body {
        // An embedded message has no single-part payload of its own; it is
        // saved as an empty file and its parts are walked separately.
        PartType::Multipart(_) | PartType::Message(_) => Cow::Borrowed(&[]),
        PartType::Text(_) | PartType::Html(_) => text_body_bytes(msg, part),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => Cow::Borrowed(bytes.as_ref()),
    };

    Part {
        disposition,
        filename: part.attachment_name().map(String::from),
        content_type,
        subtype,
        payload,
        depth,
        encoding_problem: part.is_encoding_problem,
    }
}

/// Transfer-decoded bytes of a text part, with no charset conversion.
///
/// `mail-parser` hands text bodies back converted to UTF-8, so the body is
/// cut out of the raw message again and decoded per its
/// `Content-Transfer-Encoding`. Bodies the parser could not decode are
/// re-typed as text, so this also recovers what it gave up on: a body that
/// still does not decode is returned as it appears on the wire.
fn text_body_bytes<'a>(
    msg: &'a mail_parser::Message<'_>,
    part: &MessagePart<'_>,
) -> Cow<'a, [u8]> {
    let body: &'a [u8] = msg
        .raw_message
        .get(part.offset_body..part.offset_end)
        .unwrap_or_default();

    let decoded = match part.content_transfer_encoding() {
        Some(cte) if cte.trim().eq_ignore_ascii_case("base64") => base64_decode(body),
        Some(cte) if cte.trim().eq_ignore_ascii_case("quoted-printable") => {
            quoted_printable_decode(body)
        }
        _ => None,
    };

    decoded.map_or(Cow::Borrowed(body), Cow::Owned)
}

/// Skip a UTF-8 BOM and the `From ` separator line of mbox-style messages.
fn skip_from_line(data: &[u8]) -> &[u8] {
    let data = data.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(data);

    if data.starts_with(b"From ") {
        if let Some(pos) = data.iter().position(|&b| b == b'\n') {
            return &data[pos + 1..];
        }
    }
    data
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIXED: &[u8] = b"From: a@example.com\r\n\
Subject: Mixed\r\n\
MIME-Version: 1.0\r\n\
Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/plain\r\n\
\r\n\
Body text.\r\n\
--b1\r\n\
Content-Type: application/pdf; name=\"doc.pdf\"\r\n\
Content-Disposition: attachment; filename=\"doc.pdf\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
JVBERi0xLjQ=\r\n\
--b1--\r\n";

    #[test]
    fn test_skip_from_line() {
        let data = b"From user@example.com Thu Jan 01 00:00:00 2024\nSubject: Test\n\nBody\n";
        let result = skip_from_line(data);
        assert!(result.starts_with(b"Subject:"));
    }

    #[test]
    fn test_skip_from_line_no_from() {
        let data = b"Subject: Test\n\nBody\n";
        let result = skip_from_line(data);
        assert_eq!(result, data);
    }

    #[test]
    fn test_skip_bom() {
        let data = b"\xEF\xBB\xBFSubject: Test\n\nBody\n";
        assert!(skip_from_line(data).starts_with(b"Subject:"));
    }

    #[test]
    fn test_parse_empty_is_error() {
        assert!(matches!(parse_message(b""), Err(ExtractError::Parse(_))));
        assert!(matches!(parse_message(b" \r\n\t"), Err(ExtractError::Parse(_))));
    }

    #[test]
    fn test_parts_preorder() {
        let msg = parse_message(MIXED).unwrap();
        assert_eq!(msg.subject(), Some("Mixed"));

        let parts = msg.parts();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0].subtype.as_deref(), Some("mixed"));
        assert!(parts[0].payload.is_empty());
        assert_eq!(parts[0].depth, 0);
        assert_eq!(parts[1].subtype.as_deref(), Some("plain"));
        assert_eq!(parts[2].content_type.as_deref(), Some("application/pdf"));
        assert_eq!(parts[2].depth, 1);
    }

    #[test]
    fn test_attachments_only() {
        let msg = parse_message(MIXED).unwrap();
        let attachments = msg.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].disposition, Disposition::Attachment);
        assert_eq!(attachments[0].filename.as_deref(), Some("doc.pdf"));
        assert_eq!(attachments[0].payload.as_ref(), b"%PDF-1.4");
    }

    #[test]
    fn test_missing_content_type_defaults_to_plain() {
        let raw = b"Subject: bare\r\nContent-Disposition: attachment\r\n\r\nhello\r\n";
        let msg = parse_message(raw).unwrap();
        let parts = msg.parts();
        assert_eq!(parts.len(), 1);
        assert!(parts[0].content_type.is_none());
        assert_eq!(parts[0].subtype.as_deref(), Some("plain"));
        assert!(parts[0].is_attachment());
    }
    #[test]
    fn test_text_payload_keeps_original_charset_bytes() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: text/csv; charset=iso-8859-1\r\n\
Content-Disposition: attachment; filename=\"menu.csv\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
Y2Fm6Q==\r\n\
--b1\r\n\
Content-Type: text/plain; charset=iso-8859-1\r\n\
Content-Disposition: attachment; filename=\"qp.txt\"\r\n\
Content-Transfer-Encoding: quoted-printable\r\n\
\r\n\
caf=E9\r\n\
--b1--\r\n";
        let msg = parse_message(raw).unwrap();
        let attachments = msg.attachments();
        assert_eq!(attachments.len(), 2);
        assert_eq!(attachments[0].payload.as_ref(), b"caf\xE9");
        assert_eq!(attachments[1].payload.as_ref(), b"caf\xE9");
        assert!(!attachments[0].encoding_problem);
    }

    #[test]
    fn test_undecodable_body_is_recovered_raw() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: application/octet-stream\r\n\
Content-Disposition: attachment; filename=\"garbled.bin\"\r\n\
Content-Transfer-Encoding: base64\r\n\
\r\n\
not*valid!base64\r\n\
--b1--\r\n";
        let msg = parse_message(raw).unwrap();
        let attachments = msg.attachments();
        assert_eq!(attachments.len(), 1);
        assert!(attachments[0].encoding_problem);
        assert_eq!(attachments[0].filename.as_deref(), Some("garbled.bin"));
        assert_eq!(attachments[0].payload.as_ref(), b"not*valid!base64");
    }

    #[test]
    fn test_walk_has_no_depth_limit() {
        let levels = 40;
        let mut raw = String::from("Subject: deep\r\n");
        for level in 0..levels {
            raw.push_str(&format!(
                "Content-Type: multipart/mixed; boundary=\"b{level:02}\"\r\n\r\n--b{level:02}\r\n"
            ));
        }
        raw.push_str("Content-Disposition: attachment; filename=\"bottom.bin\"\r\n\r\nbottom\r\n");
        for level in (0..levels).rev() {
            raw.push_str(&format!("--b{level:02}--\r\n"));
        }

        let msg = parse_message(raw.as_bytes()).unwrap();
        let parts = msg.parts();
        assert_eq!(parts.len(), levels + 1);
        assert_eq!(parts[levels].depth, levels);

        let attachments = msg.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].payload.as_ref(), b"bottom");
    }

    #[test]
    fn test_embedded_message_payload_is_empty() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"b1\"\r\n\
\r\n\
--b1\r\n\
Content-Type: message/rfc822\r\n\
Content-Disposition: attachment; filename=\"fwd.eml\"\r\n\
\r\n\
Subject: inner\r\n\
\r\n\
inner body\r\n\
--b1--\r\n";
        let msg = parse_message(raw).unwrap();
        let attachments = msg.attachments();
        assert_eq!(attachments.len(), 1);
        assert_eq!(attachments[0].filename.as_deref(), Some("fwd.eml"));
        assert!(attachments[0].payload.is_empty());
        // the embedded message's own body part is still visited
        assert_eq!(msg.parts().len(), 3);
    }
}
