//! Error types for imap-attachments

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    /// TCP, DNS or timeout failure while connecting or logging in.
    #[error("Connection error: {0}")]
    Connection(String),

    #[error("TLS error: {0}")]
    Tls(String),

    /// The server rejected the credentials.
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Not connected to IMAP server")]
    NotConnected,

    #[error("Invalid client state: {0}")]
    InvalidState(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The server answered a command with NO/BAD or an unusable
    /// response. The connection stays usable.
    #[error("Fetch failed: {0}")]
    Fetch(String),

    /// The transport broke or timed out after the connection was
    /// established. The client can no longer be used.
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    #[error("Message UID {0} not found")]
    MessageNotFound(u32),

    #[error("Email parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Whether this error means the mailbox could not be reached or
    /// the session went away. Callers usually answer these by asking
    /// the user to re-authenticate rather than surfacing the details.
    #[must_use]
    pub const fn is_connection_failure(&self) -> bool {
        matches!(
            self,
            Self::Connection(_) | Self::Tls(_) | Self::Auth(_) | Self::ConnectionLost(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, Error>;
