//! Centralized error types for mailextract.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mailextract library.
#[derive(Error, Debug)]
pub enum ExtractError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified message file does not exist.
    #[error("Message file not found: {0}")]
    FileNotFound(PathBuf),

    /// The raw bytes do not form a parseable message.
    #[error("Could not parse message: {0}")]
    Parse(String),

    /// Writing an attachment to disk failed.
    #[error("Failed to write attachment '{path}': {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The connection (TCP or TLS) to the mail server could not be opened.
    #[error("Could not connect to mail server: {0}")]
    Connect(String),

    /// The mail server rejected the supplied credentials.
    #[error("Login failed: {0}")]
    Authentication(String),

    /// The mailbox could not be selected.
    #[error("Could not select mailbox '{mailbox}': {reason}")]
    Select { mailbox: String, reason: String },

    /// The server rejected the search query.
    #[error("Search failed: {0}")]
    Search(String),

    /// One message's raw content could not be retrieved.
    #[error("Failed to fetch message {id}: {reason}")]
    Fetch { id: u32, reason: String },

    /// Closing the mailbox session failed.
    #[error("Logout failed: {0}")]
    Logout(String),
}

/// Convenience alias for `Result<T, ExtractError>`.
pub type Result<T> = std::result::Result<T, ExtractError>;

impl ExtractError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a `Write` variant from a path and an `io::Error`.
    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}
