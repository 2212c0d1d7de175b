//! Mailbox client for listing and extracting attachments

use crate::config::MailboxConfig;
use crate::connection::{self, ConnectionState, ImapSession, command_error};
use crate::error::{Error, Result};
use crate::message::{self, AttachmentPayload, MessageSummary};
use crate::structure::MimePartNode;
use async_imap::types::Fetch;
use futures::TryStreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{debug, info, warn};

const INBOX: &str = "INBOX";

/// Read-only IMAP client bound to a single account.
///
/// One client owns at most one connection. Every operation takes
/// `&mut self`, so commands on the same connection never overlap;
/// share a client between tasks only behind a mutex, and prefer one
/// client per request.
///
/// ```no_run
/// # async fn run() -> imap_attachments::Result<()> {
/// use imap_attachments::{MailboxClient, MailboxConfig};
///
/// let config = MailboxConfig::new("me@example.com", "secret", "imap.example.com", 993, true);
/// let mut client = MailboxClient::new(config);
/// client.connect().await?;
/// let messages = client.list_attachment_messages(20).await;
/// client.disconnect().await;
/// for message in messages? {
///     println!("{} {}", message.uid, message.subject);
/// }
/// # Ok(())
/// # }
/// ```
pub struct MailboxClient {
    config: MailboxConfig,
    state: ConnectionState,
    session: Option<ImapSession>,
    uid_validity: Option<u32>,
}

impl MailboxClient {
    #[must_use]
    pub const fn new(config: MailboxConfig) -> Self {
        Self {
            config,
            state: ConnectionState::NotConnected,
            session: None,
            uid_validity: None,
        }
    }

    #[must_use]
    pub const fn config(&self) -> &MailboxConfig {
        &self.config
    }

    #[must_use]
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// UIDVALIDITY reported when INBOX was last opened.
    ///
    /// UIDs from this client are only meaningful while this value is
    /// unchanged; after a reconnect compare it and re-list if it
    /// differs.
    #[must_use]
    pub const fn uid_validity(&self) -> Option<u32> {
        self.uid_validity
    }

    /// Connect and log in.
    ///
    /// No retries are attempted; on failure the client is left in
    /// [`ConnectionState::Failed`] and must be replaced.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidState`] if this client was already used.
    /// - [`Error::Connection`] / [`Error::Tls`] on transport failure or
    ///   timeout.
    /// - [`Error::Auth`] if the credentials are rejected.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state != ConnectionState::NotConnected {
            return Err(Error::InvalidState(format!(
                "connect() called in state {:?}; create a new client",
                self.state
            )));
        }

        self.state = ConnectionState::Connecting;
        match connection::connect(&self.config).await {
            Ok(session) => {
                self.session = Some(session);
                self.state = ConnectionState::Ready;
                Ok(())
            }
            Err(e) => {
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    /// Log out and release the connection.
    ///
    /// Never fails. Calling it twice, or without a prior
    /// [`connect`](Self::connect), does nothing.
    pub async fn disconnect(&mut self) {
        let Some(mut session) = self.session.take() else {
            return;
        };

        match timeout(self.config.command_timeout, session.logout()).await {
            Ok(Ok(())) => debug!("Logged out of {}", self.config.host),
            Ok(Err(e)) => warn!("Logout failed: {}", e),
            Err(_) => warn!("Logout timed out"),
        }
        self.state = ConnectionState::Closed;
    }

    /// Check the configured credentials by connecting and
    /// disconnecting. Any failure is reported as `false`.
    ///
    /// Only meaningful on a fresh client. On a client that was already
    /// used this returns `false` and leaves its session untouched.
    pub async fn test_connection(&mut self) -> bool {
        match self.connect().await {
            Ok(()) => {
                self.disconnect().await;
                true
            }
            Err(e) => {
                debug!("Connection test failed: {}", e);
                false
            }
        }
    }

    /// List the most recent messages in INBOX that carry attachments,
    /// newest (highest UID) first.
    ///
    /// Looks at the `limit` highest UIDs, so the result never has more
    /// than `limit` entries. INBOX is opened read-only and bodies are
    /// fetched with `BODY.PEEK[]`, so no flags change. Messages that
    /// fail to parse are logged and skipped.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidArgument`] if `limit` is zero.
    /// - [`Error::NotConnected`] if not connected.
    /// - [`Error::Fetch`] if the server rejects a command.
    /// - [`Error::ConnectionLost`] if the transport fails; the client
    ///   is then unusable.
    pub async fn list_attachment_messages(&mut self, limit: usize) -> Result<Vec<MessageSummary>> {
        if limit == 0 {
            return Err(Error::InvalidArgument("limit must be at least 1".into()));
        }

        let mut session = self.checkout()?;
        let result = self.list_in_session(&mut session, limit).await;
        self.checkin(session, result.as_ref().err());
        result
    }

    /// Fetch one message with its primary text body.
    ///
    /// Returns `Ok(None)` if no message has this UID.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if not connected.
    /// - [`Error::Fetch`] / [`Error::ConnectionLost`] on fetch failure.
    /// - [`Error::Parse`] if the message cannot be parsed.
    pub async fn message_details(&mut self, uid: u32) -> Result<Option<MessageSummary>> {
        let mut session = self.checkout()?;
        let result = self.fetch_raw_in_session(&mut session, uid).await;
        self.checkin(session, result.as_ref().err());

        result?
            .map(|raw| message::parse_details(uid, &raw))
            .transpose()
    }

    /// Extract every attachment of one message, in MIME order.
    ///
    /// A message without attachments yields an empty vector.
    ///
    /// # Errors
    ///
    /// - [`Error::NotConnected`] if not connected.
    /// - [`Error::MessageNotFound`] if no message has this UID.
    /// - [`Error::Fetch`] / [`Error::ConnectionLost`] on fetch failure.
    /// - [`Error::Parse`] if any part cannot be decoded; no partial
    ///   result is returned.
    pub async fn download_attachments(&mut self, uid: u32) -> Result<Vec<AttachmentPayload>> {
        let mut session = self.checkout()?;
        let result = self.fetch_raw_in_session(&mut session, uid).await;
        self.checkin(session, result.as_ref().err());

        let raw = result?.ok_or(Error::MessageNotFound(uid))?;
        let payloads = message::extract_attachments(&raw)?;
        info!("Extracted {} attachment(s) from UID {}", payloads.len(), uid);
        Ok(payloads)
    }

    // -- session bookkeeping --

    /// Take the session out for one operation. The state reads
    /// `Failed` until [`checkin`](Self::checkin); if the operation is
    /// abandoned the session is dropped with it.
    fn checkout(&mut self) -> Result<ImapSession> {
        if self.state != ConnectionState::Ready {
            return Err(Error::NotConnected);
        }
        let session = self.session.take().ok_or(Error::NotConnected)?;
        self.state = ConnectionState::Failed;
        Ok(session)
    }

    fn checkin(&mut self, session: ImapSession, error: Option<&Error>) {
        if let Some(e @ Error::ConnectionLost(_)) = error {
            warn!("Dropping IMAP connection: {}", e);
            return;
        }
        self.session = Some(session);
        self.state = ConnectionState::Ready;
    }

    // -- operations on a checked-out session --

    async fn examine_inbox(&mut self, session: &mut ImapSession) -> Result<()> {
        let mailbox = bounded(self.config.command_timeout, "EXAMINE", session.examine(INBOX))
            .await?
            .map_err(|e| command_error("EXAMINE INBOX failed", e))?;

        if let (Some(previous), Some(current)) = (self.uid_validity, mailbox.uid_validity)
            && previous != current
        {
            warn!(
                "UIDVALIDITY changed from {} to {}; earlier UIDs are stale",
                previous, current
            );
        }
        self.uid_validity = mailbox.uid_validity;
        debug!("Examined {} ({} messages)", INBOX, mailbox.exists);
        Ok(())
    }

    async fn list_in_session(
        &mut self,
        session: &mut ImapSession,
        limit: usize,
    ) -> Result<Vec<MessageSummary>> {
        self.examine_inbox(session).await?;

        let command_timeout = self.config.command_timeout;
        let uids = bounded(command_timeout, "UID SEARCH", session.uid_search("ALL"))
            .await?
            .map_err(|e| command_error("Search failed", e))?;

        let candidates = most_recent(uids, limit);
        if candidates.is_empty() {
            return Ok(Vec::new());
        }
        info!("Checking {} most recent messages for attachments", candidates.len());

        let structures =
            fetch_all(session, &candidates, "(UID BODYSTRUCTURE)", command_timeout).await?;
        let mut with_attachments = Vec::new();
        for fetch in &structures {
            let (Some(uid), Some(bs)) = (fetch.uid, fetch.bodystructure()) else {
                continue;
            };
            let tree = MimePartNode::from_body_structure(bs);
            if tree.has_attachment() {
                debug!(
                    "UID {} ({}, {} parts, depth {}): {} attachment(s): {}",
                    uid,
                    tree.content_type(),
                    tree.leaf_count(),
                    tree.depth(),
                    tree.attachment_count(),
                    tree.describe_attachments().join(", ")
                );
                with_attachments.push(uid);
            }
        }
        drop(structures);

        if with_attachments.is_empty() {
            return Ok(Vec::new());
        }

        let bodies =
            fetch_all(session, &with_attachments, "(UID BODY.PEEK[])", command_timeout).await?;
        let mut parsed: HashMap<u32, MessageSummary> = HashMap::new();
        for fetch in &bodies {
            let (Some(uid), Some(raw)) = (fetch.uid, fetch.body()) else {
                continue;
            };
            match message::parse_summary(uid, raw) {
                Ok(summary) if summary.has_attachments => {
                    parsed.insert(uid, summary);
                }
                Ok(_) => warn!("UID {} reported attachments but none parsed; skipping", uid),
                Err(e) => warn!("Failed to parse UID {}: {}", uid, e),
            }
        }

        // `candidates` is already newest first.
        Ok(candidates
            .iter()
            .filter_map(|uid| parsed.remove(uid))
            .collect())
    }

    async fn fetch_raw_in_session(
        &mut self,
        session: &mut ImapSession,
        uid: u32,
    ) -> Result<Option<Vec<u8>>> {
        self.examine_inbox(session).await?;

        let command_timeout = self.config.command_timeout;
        let fetches = fetch_all(session, &[uid], "(UID BODY.PEEK[])", command_timeout).await?;
        let Some(fetch) = fetches.iter().find(|f| f.uid == Some(uid)) else {
            debug!("UID {} not found in {}", uid, INBOX);
            return Ok(None);
        };

        fetch
            .body()
            .map(|body| Some(body.to_vec()))
            .ok_or_else(|| Error::Fetch(format!("No body found for UID {uid}")))
    }
}

/// The `limit` numerically highest UIDs, highest first.
fn most_recent(uids: impl IntoIterator<Item = u32>, limit: usize) -> Vec<u32> {
    let mut sorted: Vec<u32> = uids.into_iter().collect();
    sorted.sort_unstable_by(|a, b| b.cmp(a));
    sorted.dedup();
    sorted.truncate(limit);
    sorted
}

/// `UID FETCH` a set of UIDs and collect every response. A message is
/// only handed on once its literal has been read completely.
async fn fetch_all(
    session: &mut ImapSession,
    uids: &[u32],
    query: &str,
    limit: Duration,
) -> Result<Vec<Fetch>> {
    let uid_set = uids
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",");
    debug!("UID FETCH {} {}", uid_set, query);

    let collect = async {
        let stream = session
            .uid_fetch(&uid_set, query)
            .await
            .map_err(|e| command_error("Fetch failed", e))?;
        stream
            .try_collect::<Vec<_>>()
            .await
            .map_err(|e| command_error("Fetch error", e))
    };

    bounded(limit, "UID FETCH", collect).await?
}

/// Time-box a command. Running out of time leaves the connection in
/// an unknown state, so it counts as lost.
async fn bounded<F: Future>(limit: Duration, command: &str, fut: F) -> Result<F::Output> {
    timeout(limit, fut)
        .await
        .map_err(|_| Error::ConnectionLost(format!("{command} timed out after {limit:?}")))
}
