//! Remote mailbox source: search a mailbox over IMAP and extract the
//! attachments of every matching message.
//!
//! Sessions sit behind the [`MailSession`] trait. [`ImapSession`] is the real
//! implementation (implicit TLS via `native-tls`); [`SessionGuard`] owns a
//! session for the length of one run and logs out when dropped, whichever
//! way the run ends.

use std::net::TcpStream;
use std::ops::{Deref, DerefMut};
use std::path::Path;

use native_tls::{TlsConnector, TlsStream};

use crate::error::{ExtractError, Result};
use crate::export::attachment::extract_attachments;
use crate::model::attachment::Extraction;

/// Default IMAPS port.
pub const DEFAULT_PORT: u16 = 993;

/// Fetch item that returns the full message and marks it `\Seen`.
const FETCH_ITEM: &str = "RFC822";

/// Fetch item that returns the full message and leaves flags untouched.
const FETCH_ITEM_PEEK: &str = "BODY.PEEK[]";

/// Connection and search parameters for one mailbox run.
#[derive(Debug, Clone)]
pub struct MailboxSettings {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub password: String,
    /// Mailbox to select, e.g. `"INBOX"`.
    pub mailbox: String,
    /// Server-side IMAP SEARCH query, e.g. `"UNSEEN"` or `"SINCE 01-Feb-2025"`.
    pub criteria: String,
    /// Fetch with `BODY.PEEK[]` so messages are not marked as read.
    pub peek: bool,
}

/// The mailbox operations the extractor needs.
pub trait MailSession {
    /// Select `mailbox` for the following search and fetches.
    fn select(&mut self, mailbox: &str) -> Result<()>;

    /// Run a server-side search and return matching sequence numbers.
    fn search(&mut self, criteria: &str) -> Result<Vec<u32>>;

    /// Fetch the full raw message with sequence number `id`.
    fn fetch_raw(&mut self, id: u32) -> Result<Vec<u8>>;

    /// End the session.
    fn logout(&mut self) -> Result<()>;
}

/// An authenticated IMAP session over TLS.
pub struct ImapSession {
    session: imap::Session<TlsStream<TcpStream>>,
    fetch_item: &'static str,
}

/// Open a TLS connection to the server and log in.
pub fn connect(settings: &MailboxSettings) -> Result<ImapSession> {
    let tls = TlsConnector::builder()
        .build()
        .map_err(|e| ExtractError::Connect(format!("TLS setup failed: {e}")))?;

    tracing::info!(host = %settings.host, port = settings.port, "Connecting to IMAP server");
    let client = imap::connect(
        (settings.host.as_str(), settings.port),
        &settings.host,
        &tls,
    )
    .map_err(|e| ExtractError::Connect(format!("{}:{}: {e}", settings.host, settings.port)))?;

    let session = client
        .login(&settings.user, &settings.password)
        .map_err(|(e, _client)| ExtractError::Authentication(format!("{}: {e}", settings.user)))?;
    tracing::info!(user = %settings.user, "Logged in");

    Ok(ImapSession {
        session,
        fetch_item: if settings.peek {
            FETCH_ITEM_PEEK
        } else {
            FETCH_ITEM
        },
    })
}

impl MailSession for ImapSession {
    fn select(&mut self, mailbox: &str) -> Result<()> {
        let selected = self.session.select(mailbox).map_err(|e| ExtractError::Select {
            mailbox: mailbox.to_string(),
            reason: e.to_string(),
        })?;
        tracing::debug!(mailbox, exists = selected.exists, "Selected mailbox");
        Ok(())
    }

    fn search(&mut self, criteria: &str) -> Result<Vec<u32>> {
        let mut ids: Vec<u32> = self
            .session
            .search(criteria)
            .map_err(|e| ExtractError::Search(e.to_string()))?
            .into_iter()
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }

    fn fetch_raw(&mut self, id: u32) -> Result<Vec<u8>> {
        let fetches = self
            .session
            .fetch(id.to_string(), self.fetch_item)
            .map_err(|e| ExtractError::Fetch {
                id,
                reason: e.to_string(),
            })?;

        fetches
            .iter()
            .find_map(|fetch| fetch.body())
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ExtractError::Fetch {
                id,
                reason: "server returned no message body".into(),
            })
    }

    fn logout(&mut self) -> Result<()> {
        self.session
            .logout()
            .map_err(|e| ExtractError::Logout(e.to_string()))
    }
}

/// Owns a session and logs it out on drop.
pub struct SessionGuard<S: MailSession> {
    session: S,
}

impl<S: MailSession> SessionGuard<S> {
    pub fn new(session: S) -> Self {
        Self { session }
    }
}

impl<S: MailSession> Deref for SessionGuard<S> {
    type Target = S;

    fn deref(&self) -> &S {
        &self.session
    }
}

impl<S: MailSession> DerefMut for SessionGuard<S> {
    fn deref_mut(&mut self) -> &mut S {
        &mut self.session
    }
}

impl<S: MailSession> Drop for SessionGuard<S> {
    fn drop(&mut self) {
        match self.session.logout() {
            Ok(()) => tracing::debug!("Logged out"),
            Err(e) => tracing::warn!(error = %e, "Failed to log out cleanly"),
        }
    }
}

/// One processed message, handed to the caller's callback.
pub struct MessageReport<'a> {
    /// 1-based position among the matched messages.
    pub position: usize,
    /// Number of matched messages.
    pub total: usize,
    /// Server sequence number.
    pub id: u32,
    /// Fetch, parse or extraction result for this message.
    pub outcome: &'a Result<Extraction>,
}

/// Totals for one mailbox run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct MailboxSummary {
    /// Messages matched by the search.
    pub matched: usize,
    /// Messages fetched and parsed successfully.
    pub processed: usize,
    /// Messages that could not be fetched or parsed.
    pub failed: usize,
    /// Attachments written.
    pub attachments: usize,
    /// Attachments that qualified but could not be written.
    pub failed_attachments: usize,
}

/// Select `mailbox` and return the ids matching `criteria`.
pub fn search_messages(
    session: &mut dyn MailSession,
    mailbox: &str,
    criteria: &str,
) -> Result<Vec<u32>> {
    session.select(mailbox)?;
    let ids = session.search(criteria)?;
    tracing::info!(mailbox, criteria, count = ids.len(), "Search complete");
    Ok(ids)
}

/// Fetch each message in `ids` and extract its attachments into
/// `output_dir`.
///
/// A message that cannot be fetched or parsed is logged, reported through
/// `on_message` and skipped. No retries.
pub fn extract_messages(
    session: &mut dyn MailSession,
    ids: &[u32],
    output_dir: &Path,
    on_message: &mut dyn FnMut(MessageReport<'_>),
) -> MailboxSummary {
    let mut summary = MailboxSummary {
        matched: ids.len(),
        ..MailboxSummary::default()
    };

    for (i, &id) in ids.iter().enumerate() {
        let outcome = session
            .fetch_raw(id)
            .and_then(|raw| extract_attachments(&raw, output_dir));

        match &outcome {
            Ok(extraction) => {
                summary.processed += 1;
                summary.attachments += extraction.saved.len();
                summary.failed_attachments += extraction.failed.len();
            }
            Err(e) => {
                summary.failed += 1;
                tracing::warn!(id, error = %e, "Skipping message");
            }
        }

        on_message(MessageReport {
            position: i + 1,
            total: ids.len(),
            id,
            outcome: &outcome,
        });
    }

    summary
}

/// Search `mailbox` and extract attachments from every match.
pub fn fetch_and_extract(
    session: &mut dyn MailSession,
    mailbox: &str,
    criteria: &str,
    output_dir: &Path,
    on_message: &mut dyn FnMut(MessageReport<'_>),
) -> Result<MailboxSummary> {
    let ids = search_messages(session, mailbox, criteria)?;
    Ok(extract_messages(session, &ids, output_dir, on_message))
}

/// Connect, log in, search, extract and log out.
///
/// Login, select and search failures end the run with an error; the
/// session is logged out on every path once login succeeded.
pub fn run(
    settings: &MailboxSettings,
    output_dir: &Path,
    on_message: &mut dyn FnMut(MessageReport<'_>),
) -> Result<MailboxSummary> {
    let mut session = SessionGuard::new(connect(settings)?);
    fetch_and_extract(
        &mut *session,
        &settings.mailbox,
        &settings.criteria,
        output_dir,
        on_message,
    )
}
