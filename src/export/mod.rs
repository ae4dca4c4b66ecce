//! Writing attachments to disk: safe filenames and the extractor itself.

pub mod attachment;
pub mod filename;

pub use attachment::{extract, extract_attachments};
