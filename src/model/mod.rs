//! Core data model types for message parts and saved attachments.

pub mod attachment;
pub mod part;
