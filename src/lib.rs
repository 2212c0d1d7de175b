//! IMAP attachment client library
//!
//! Connects to a single IMAP account, lists recent INBOX messages that
//! carry attachments, and extracts attachment payloads. The client is
//! read-only: INBOX is opened with EXAMINE and bodies are fetched with
//! `BODY.PEEK[]`, so no flags change.
//!
//! A message counts as having attachments when one of its leaf MIME
//! parts has `Content-Disposition: attachment`. Inline images and other
//! parts without that disposition are ignored.

mod client;
mod config;
mod connection;
mod error;
mod message;
mod sanitize;
mod structure;

pub use client::MailboxClient;
pub use config::MailboxConfig;
pub use connection::ConnectionState;
pub use error::{Error, Result};
pub use message::{
    AttachmentPayload, AttachmentSummary, DEFAULT_CONTENT_TYPE, MessageSummary, NO_SUBJECT,
    UNKNOWN_SENDER, UNNAMED_ATTACHMENT,
};
pub use sanitize::sanitize_filename;
