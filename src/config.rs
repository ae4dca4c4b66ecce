//! Application configuration.
//!
//! Configuration is loaded from a TOML file at:
//! 1. `$MAILEXTRACT_CONFIG` (environment variable)
//! 2. `~/.config/mailextract/config.toml` (Linux/macOS)
//!    `%APPDATA%\mailextract\config.toml` (Windows)
//! 3. Built-in defaults
//!
//! Command-line flags always win over values read here.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::source::mailbox::DEFAULT_PORT;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General behavior settings.
    pub general: GeneralConfig,
    /// Local file and directory mode.
    pub local: LocalConfig,
    /// Mailbox mode defaults.
    pub imap: ImapConfig,
}

/// General behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log level: "error", "warn", "info", "debug", "trace".
    pub log_level: String,
    /// Override the directory the log file is written to.
    pub log_dir: Option<PathBuf>,
}

/// Local file and directory mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LocalConfig {
    /// File extensions treated as messages in directory mode (case-insensitive).
    pub extensions: Vec<String>,
}

/// Mailbox mode defaults. The password only comes from the command line or
/// `MAILEXTRACT_PASSWORD`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ImapConfig {
    /// Server host name.
    pub host: Option<String>,
    /// Server port (implicit TLS).
    pub port: u16,
    /// Login user name.
    pub user: Option<String>,
    /// Mailbox to search.
    pub mailbox: String,
    /// IMAP SEARCH criteria.
    pub criteria: String,
    /// Fetch with `BODY.PEEK[]` so messages stay unread.
    pub peek: bool,
}

// ── Default implementations ─────────────────────────────────────

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "warn".to_string(),
            log_dir: None,
        }
    }
}

impl Default for LocalConfig {
    fn default() -> Self {
        Self {
            extensions: vec!["eml".to_string()],
        }
    }
}

impl Default for ImapConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: DEFAULT_PORT,
            user: None,
            mailbox: "INBOX".to_string(),
            criteria: "ALL".to_string(),
            peek: false,
        }
    }
}

// ── Load ────────────────────────────────────────────────────────

/// Load configuration, searching standard locations.
///
/// Returns the default configuration if no file is found or on parse error.
pub fn load_config() -> Config {
    if let Some(path) = config_file_path() {
        if path.exists() {
            match std::fs::read_to_string(&path) {
                Ok(contents) => match toml::from_str::<Config>(&contents) {
                    Ok(cfg) => {
                        tracing::info!(path = %path.display(), "Loaded config");
                        return cfg;
                    }
                    Err(e) => {
                        tracing::warn!(
                            path = %path.display(),
                            error = %e,
                            "Failed to parse config, using defaults"
                        );
                    }
                },
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Failed to read config file, using defaults"
                    );
                }
            }
        }
    }
    Config::default()
}

/// Determine the config file path (checking env var first, then standard dirs).
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var("MAILEXTRACT_CONFIG") {
        return Some(PathBuf::from(env_path));
    }

    dirs::config_dir().map(|d| d.join("mailextract").join("config.toml"))
}

/// Return the directory the log file goes in.
pub fn log_dir(config: &Config) -> PathBuf {
    if let Some(ref dir) = config.general.log_dir {
        return dir.clone();
    }
    dirs::cache_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("mailextract")
}
