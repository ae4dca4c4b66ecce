//! Message parsing: reading `.eml` files and walking the MIME tree.

pub mod eml;
pub mod mime;
