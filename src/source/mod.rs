//! Where raw messages come from: local files or a remote mailbox.

pub mod local;
pub mod mailbox;
