//! Test data model for the fake IMAP server
//!
//! Provides a builder-style API for constructing mailbox state:
//!
//! ```ignore
//! let mailbox = MailboxBuilder::new()
//!     .folder("INBOX")
//!         .email(1, false, raw_rfc2822_bytes)
//!         .email(2, true, raw_rfc2822_bytes)
//!     .credentials("alice", "secret")
//!     .build();
//! ```
//!
//! The `Mailbox` is shared with the fake IMAP server behind a mutex.
//! FETCH without `.PEEK` sets `\Seen`, so tests can take a snapshot
//! afterwards and check that the client stayed read-only.

pub const DEFAULT_USER: &str = "testuser";
pub const DEFAULT_PASSWORD: &str = "testpass";

/// How the server misbehaves when it receives a UID FETCH.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchFault {
    #[default]
    None,
    /// Send half of a literal, then close the socket.
    Drop,
    /// Never answer.
    Stall,
}

/// Folders plus the account the server accepts.
#[derive(Debug, Clone)]
pub struct Mailbox {
    pub folders: Vec<Folder>,
    pub username: String,
    pub password: String,
    pub fetch_fault: FetchFault,
}

impl Mailbox {
    /// Look up a folder by name (case-sensitive, matching real IMAP).
    pub fn get_folder(&self, name: &str) -> Option<&Folder> {
        self.folders.iter().find(|f| f.name == name)
    }

    /// Look up an email by folder and UID.
    pub fn get_email(&self, folder: &str, uid: u32) -> Option<&TestEmail> {
        self.get_folder(folder)?.emails.iter().find(|e| e.uid == uid)
    }

    /// Set `\Seen` on a message, as a non-PEEK body fetch does.
    pub fn mark_seen(&mut self, folder: &str, uid: u32) {
        if let Some(email) = self
            .folders
            .iter_mut()
            .find(|f| f.name == folder)
            .and_then(|f| f.emails.iter_mut().find(|e| e.uid == uid))
        {
            email.seen = true;
        }
    }

    pub fn accepts(&self, username: &str, password: &str) -> bool {
        self.username == username && self.password == password
    }
}

/// A single IMAP folder (e.g. "INBOX").
#[derive(Debug, Clone)]
pub struct Folder {
    pub name: String,
    pub emails: Vec<TestEmail>,
}

/// A test email stored in a folder.
///
/// - `uid`: IMAP UID, unique per folder and stable across sessions.
/// - `seen`: whether the `\Seen` flag is set.
/// - `raw`: the complete RFC 2822 message (headers + body). This is
///   what gets returned for `BODY[]`, and what BODYSTRUCTURE is
///   derived from.
#[derive(Debug, Clone)]
pub struct TestEmail {
    pub uid: u32,
    pub seen: bool,
    pub raw: Vec<u8>,
}

/// Builder for constructing a `Mailbox` step by step.
///
/// Call `.folder(name)` to start a new folder, then chain
/// `.email(uid, seen, raw)` calls to add messages to it.
/// Finish with `.build()` to get the final `Mailbox`.
pub struct MailboxBuilder {
    folders: Vec<Folder>,
    username: String,
    password: String,
    fetch_fault: FetchFault,
}

impl MailboxBuilder {
    pub fn new() -> Self {
        Self {
            folders: Vec::new(),
            username: DEFAULT_USER.to_string(),
            password: DEFAULT_PASSWORD.to_string(),
            fetch_fault: FetchFault::None,
        }
    }

    /// Add a new folder. Subsequent `.email()` calls add to this folder.
    pub fn folder(mut self, name: &str) -> Self {
        self.folders.push(Folder {
            name: name.to_string(),
            emails: Vec::new(),
        });
        self
    }

    /// Add an email to the most recently added folder.
    ///
    /// # Panics
    ///
    /// Panics if called before any `.folder()` call.
    pub fn email(mut self, uid: u32, seen: bool, raw: &[u8]) -> Self {
        self.folders
            .last_mut()
            .expect("call .folder() before .email()")
            .emails
            .push(TestEmail {
                uid,
                seen,
                raw: raw.to_vec(),
            });
        self
    }

    /// Replace the default `testuser`/`testpass` account.
    pub fn credentials(mut self, username: &str, password: &str) -> Self {
        self.username = username.to_string();
        self.password = password.to_string();
        self
    }

    pub const fn fetch_fault(mut self, fault: FetchFault) -> Self {
        self.fetch_fault = fault;
        self
    }

    /// Consume the builder and return the finished `Mailbox`.
    pub fn build(self) -> Mailbox {
        Mailbox {
            folders: self.folders,
            username: self.username,
            password: self.password,
            fetch_fault: self.fetch_fault,
        }
    }
}
