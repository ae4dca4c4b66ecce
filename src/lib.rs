//! `mailextract`: pull file attachments out of email messages.
//!
//! Messages come from a single `.eml` file, a directory tree of them, or a
//! remote IMAP mailbox. All three feed the same extractor, which walks the
//! MIME tree, picks out attachments, and writes each one under a sanitized,
//! collision-free name in the output directory.

pub mod config;
pub mod error;
pub mod export;
pub mod model;
pub mod parser;
pub mod source;

pub use error::{ExtractError, Result};
pub use export::{extract, extract_attachments};
