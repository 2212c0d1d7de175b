//! Transport setup and login
//!
//! Opens the TCP socket, optionally wraps it in TLS, and logs in.
//! Everything here is bounded by the timeouts in [`MailboxConfig`].

use crate::config::MailboxConfig;
use crate::error::{Error, Result};
use async_imap::Session;
use async_imap::error::Error as ImapError;
use rustls::pki_types::ServerName;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_util::compat::{Compat, TokioAsyncReadCompatExt};
use tracing::{debug, info};

/// An authenticated IMAP session over a plain or TLS stream.
pub type ImapSession = Session<Compat<ImapStream>>;

/// Lifecycle of a [`MailboxClient`](crate::MailboxClient) connection.
///
/// `Closed` and `Failed` are terminal. A client in either state must
/// be replaced by a new one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    NotConnected,
    Connecting,
    Ready,
    Failed,
    Closed,
}

impl ConnectionState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Failed | Self::Closed)
    }
}

/// A stream that is either plaintext or TLS.
#[derive(Debug)]
pub enum ImapStream {
    Plain(TcpStream),
    /// Boxed to keep the enum small.
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for ImapStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ImapStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

/// Open a fresh authenticated IMAP session.
///
/// Connects to `config.host:config.port` via TCP, performs the TLS
/// handshake when `config.tls` is set, and logs in.
///
/// # Errors
///
/// - [`Error::Connection`] on DNS/TCP failure, a timeout, or a stream
///   that dies during login.
/// - [`Error::Tls`] if the handshake fails.
/// - [`Error::Auth`] if the server rejects the credentials.
pub async fn connect(config: &MailboxConfig) -> Result<ImapSession> {
    let addr = config.address();
    debug!("Connecting to IMAP server at {}", addr);

    let tcp_stream = bounded(config.connect_timeout, "connect", TcpStream::connect(&addr))
        .await?
        .map_err(|e| Error::Connection(format!("Failed to connect to {addr}: {e}")))?;

    let stream = if config.tls {
        let connector = tls_connector(config.accept_invalid_certs)?;
        let server_name = ServerName::try_from(config.host.clone())
            .map_err(|e| Error::Tls(format!("Invalid server name: {e}")))?;
        let tls_stream = bounded(
            config.connect_timeout,
            "TLS handshake",
            connector.connect(server_name, tcp_stream),
        )
        .await?
        .map_err(|e| Error::Tls(e.to_string()))?;
        debug!("TLS established with {}", config.host);
        ImapStream::Tls(Box::new(tls_stream))
    } else {
        ImapStream::Plain(tcp_stream)
    };

    let client = async_imap::Client::new(stream.compat());

    let session = bounded(
        config.auth_timeout,
        "login",
        client.login(&config.email, &config.password),
    )
    .await?
    .map_err(|(e, _)| login_error(e))?;

    info!("Connected to IMAP server as {}", config.email);
    Ok(session)
}

async fn bounded<F: Future>(limit: Duration, step: &str, fut: F) -> Result<F::Output> {
    timeout(limit, fut)
        .await
        .map_err(|_| Error::Connection(format!("{step} timed out after {limit:?}")))
}

fn login_error(e: ImapError) -> Error {
    match e {
        ImapError::No(msg) | ImapError::Bad(msg) => Error::Auth(msg),
        other => Error::Connection(format!("Login failed: {other}")),
    }
}

/// Map an error from a command on an established session.
///
/// Transport failures poison the session and become
/// [`Error::ConnectionLost`]; everything else is a [`Error::Fetch`].
pub fn command_error(context: &str, e: ImapError) -> Error {
    match e {
        ImapError::Io(_) | ImapError::ConnectionLost => {
            Error::ConnectionLost(format!("{context}: {e}"))
        }
        other => Error::Fetch(format!("{context}: {other}")),
    }
}

/// Build a TLS connector. Verifies against the webpki roots unless
/// `accept_invalid_certs` is set.
fn tls_connector(accept_invalid_certs: bool) -> Result<TlsConnector> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());
    let builder = rustls::ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::Tls(format!("TLS setup failed: {e}")))?;

    let config = if accept_invalid_certs {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(DangerousVerifier))
            .with_no_client_auth()
    } else {
        let roots = rustls::RootCertStore {
            roots: webpki_roots::TLS_SERVER_ROOTS.to_vec(),
        };
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(TlsConnector::from(Arc::new(config)))
}

/// Certificate verifier that accepts all certificates. Only used when
/// the caller opts in via `accept_invalid_certs`.
#[derive(Debug)]
struct DangerousVerifier;

impl rustls::client::danger::ServerCertVerifier for DangerousVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> std::result::Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> std::result::Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
