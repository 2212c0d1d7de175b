//! IMAP connection configuration

use crate::error::{Error, Result};
use serde::Deserialize;
use std::env;
use std::fmt;
use std::time::Duration;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_AUTH_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Connection parameters for a single IMAP account.
///
/// Deserialises from the `{email, password, host, port, tls}` shape
/// that front ends post. Timeouts and certificate handling are not
/// part of that shape and take their defaults.
#[derive(Clone, Deserialize)]
pub struct MailboxConfig {
    /// Account address, also used as the IMAP login name.
    pub email: String,
    pub password: String,
    pub host: String,
    pub port: u16,
    /// Implicit TLS when `true`, plaintext when `false`.
    pub tls: bool,
    /// Skip server certificate verification (self-signed local servers,
    /// test servers).
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(skip, default = "default_connect_timeout")]
    pub connect_timeout: Duration,
    #[serde(skip, default = "default_auth_timeout")]
    pub auth_timeout: Duration,
    #[serde(skip, default = "default_command_timeout")]
    pub command_timeout: Duration,
}

const fn default_connect_timeout() -> Duration {
    DEFAULT_CONNECT_TIMEOUT
}

const fn default_auth_timeout() -> Duration {
    DEFAULT_AUTH_TIMEOUT
}

const fn default_command_timeout() -> Duration {
    DEFAULT_COMMAND_TIMEOUT
}

impl MailboxConfig {
    #[must_use]
    pub fn new(
        email: impl Into<String>,
        password: impl Into<String>,
        host: impl Into<String>,
        port: u16,
        tls: bool,
    ) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
            host: host.into(),
            port,
            tls,
            accept_invalid_certs: false,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            auth_timeout: DEFAULT_AUTH_TIMEOUT,
            command_timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    #[must_use]
    pub const fn with_accept_invalid_certs(mut self, accept: bool) -> Self {
        self.accept_invalid_certs = accept;
        self
    }

    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_auth_timeout(mut self, timeout: Duration) -> Self {
        self.auth_timeout = timeout;
        self
    }

    #[must_use]
    pub const fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    /// `host:port` as passed to the TCP connect.
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Load IMAP configuration from environment variables
    ///
    /// Reads from `.env` file if present. Required variables:
    /// - `IMAP_EMAIL`
    /// - `IMAP_PASSWORD`
    /// - `IMAP_HOST`
    ///
    /// Optional (with defaults):
    /// - `IMAP_TLS` (default: `true`)
    /// - `IMAP_PORT` (default: `993` with TLS, `143` without)
    /// - `IMAP_ACCEPT_INVALID_CERTS` (default: `false`)
    /// - `IMAP_CONNECT_TIMEOUT_SECS` (default: `30`)
    /// - `IMAP_AUTH_TIMEOUT_SECS` (default: `30`)
    /// - `IMAP_COMMAND_TIMEOUT_SECS` (default: `60`)
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if a required variable is missing or
    /// a value cannot be parsed.
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let tls = env_bool("IMAP_TLS")?.unwrap_or(true);
        let port = match env::var("IMAP_PORT") {
            Ok(raw) => raw
                .parse()
                .map_err(|e| Error::Config(format!("Invalid IMAP_PORT: {e}")))?,
            Err(_) if tls => 993,
            Err(_) => 143,
        };

        Ok(Self {
            email: required("IMAP_EMAIL")?,
            password: required("IMAP_PASSWORD")?,
            host: required("IMAP_HOST")?,
            port,
            tls,
            accept_invalid_certs: env_bool("IMAP_ACCEPT_INVALID_CERTS")?.unwrap_or(false),
            connect_timeout: env_secs("IMAP_CONNECT_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_CONNECT_TIMEOUT),
            auth_timeout: env_secs("IMAP_AUTH_TIMEOUT_SECS")?.unwrap_or(DEFAULT_AUTH_TIMEOUT),
            command_timeout: env_secs("IMAP_COMMAND_TIMEOUT_SECS")?
                .unwrap_or(DEFAULT_COMMAND_TIMEOUT),
        })
    }
}

impl fmt::Debug for MailboxConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MailboxConfig")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("tls", &self.tls)
            .field("accept_invalid_certs", &self.accept_invalid_certs)
            .field("connect_timeout", &self.connect_timeout)
            .field("auth_timeout", &self.auth_timeout)
            .field("command_timeout", &self.command_timeout)
            .finish()
    }
}

fn required(name: &str) -> Result<String> {
    env::var(name).map_err(|_| Error::Config(format!("{name} not set")))
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    env::var(name).ok().map_or(Ok(None), |raw| {
        parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| Error::Config(format!("Invalid {name}: {raw}")))
    })
}

fn env_secs(name: &str) -> Result<Option<Duration>> {
    env::var(name).ok().map_or(Ok(None), |raw| {
        raw.trim()
            .parse::<u64>()
            .map(|secs| Some(Duration::from_secs(secs)))
            .map_err(|e| Error::Config(format!("Invalid {name}: {e}")))
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
