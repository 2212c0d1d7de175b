//! Message and attachment types, and MIME parsing
//!
//! Raw RFC 2822 bytes arrive from the server as one complete IMAP
//! literal; nothing here ever sees a partial message. Parsing is done
//! with [`mailparse`], and a leaf part is an attachment exactly when
//! its `Content-Disposition` is `attachment`.

use crate::error::{Error, Result};
use crate::sanitize::sanitize_filename;
use chrono::{DateTime, Utc};
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};
use serde::{Deserialize, Serialize};

pub const NO_SUBJECT: &str = "(No Subject)";
pub const UNKNOWN_SENDER: &str = "Unknown";
pub const UNNAMED_ATTACHMENT: &str = "unnamed";
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Metadata about one attachment, without its content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttachmentSummary {
    pub filename: String,
    /// Decoded size in bytes.
    pub size: usize,
    pub content_type: String,
    /// `Content-ID` without angle brackets, for cid-referenced parts.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_id: Option<String>,
}

/// Per-message metadata, produced fresh by every list/fetch call.
///
/// `has_attachments` is `true` exactly when `attachments` is
/// non-empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageSummary {
    /// IMAP UID. Only meaningful within the mailbox's current
    /// UIDVALIDITY.
    pub uid: u32,
    /// `Message-ID` header, empty when absent.
    pub message_id: String,
    pub subject: String,
    pub from: String,
    /// `Date` header; `None` when missing or unparsable.
    pub date: Option<DateTime<Utc>>,
    pub has_attachments: bool,
    pub attachments: Vec<AttachmentSummary>,
    /// Primary text body. Only filled in by detail fetches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
}

/// An extracted attachment. The filename and bytes come straight from
/// the message and must be treated as untrusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttachmentPayload {
    pub filename: String,
    pub content: Vec<u8>,
    pub content_type: String,
}

impl AttachmentPayload {
    /// Filename safe to use as a single path component.
    #[must_use]
    pub fn safe_filename(&self) -> String {
        sanitize_filename(&self.filename)
    }

    #[must_use]
    pub fn size(&self) -> usize {
        self.content.len()
    }
}

/// Parse headers and attachment metadata of a raw message.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the message or any attachment body
/// cannot be decoded.
pub fn parse_summary(uid: u32, raw: &[u8]) -> Result<MessageSummary> {
    let parsed = parse(raw)?;
    summarize(uid, &parsed)
}

/// Like [`parse_summary`], plus the primary text body: the first
/// `text/plain` part, else the first `text/html` part, else empty.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the message, an attachment, or the
/// chosen body part cannot be decoded.
pub fn parse_details(uid: u32, raw: &[u8]) -> Result<MessageSummary> {
    let parsed = parse(raw)?;
    let mut summary = summarize(uid, &parsed)?;
    summary.body = Some(primary_text(&parsed)?);
    Ok(summary)
}

/// Extract every attachment of a raw message, in MIME order.
///
/// All-or-nothing: if any attachment fails to decode the whole call
/// fails rather than returning a partial list.
///
/// # Errors
///
/// Returns [`Error::Parse`] if the message or any attachment body
/// cannot be decoded.
pub fn extract_attachments(raw: &[u8]) -> Result<Vec<AttachmentPayload>> {
    let parsed = parse(raw)?;
    attachment_parts(&parsed)
        .into_iter()
        .map(|part| {
            let filename = part_filename(part);
            let content = decode(part, &filename)?;
            Ok(AttachmentPayload {
                filename,
                content,
                content_type: part_content_type(part),
            })
        })
        .collect()
}

fn parse(raw: &[u8]) -> Result<ParsedMail<'_>> {
    mailparse::parse_mail(raw).map_err(|e| Error::Parse(e.to_string()))
}

fn summarize(uid: u32, parsed: &ParsedMail<'_>) -> Result<MessageSummary> {
    let attachments = attachment_parts(parsed)
        .into_iter()
        .map(|part| {
            let filename = part_filename(part);
            let size = decode(part, &filename)?.len();
            Ok(AttachmentSummary {
                filename,
                size,
                content_type: part_content_type(part),
                content_id: content_id(part),
            })
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MessageSummary {
        uid,
        message_id: header(parsed, "Message-ID").unwrap_or_default(),
        subject: header(parsed, "Subject").unwrap_or_else(|| NO_SUBJECT.to_string()),
        from: header(parsed, "From").unwrap_or_else(|| UNKNOWN_SENDER.to_string()),
        date: header(parsed, "Date")
            .and_then(|value| mailparse::dateparse(&value).ok())
            .and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)),
        has_attachments: !attachments.is_empty(),
        attachments,
        body: None,
    })
}

/// First value of a header, decoded and trimmed; `None` if missing or
/// blank.
fn header(parsed: &ParsedMail<'_>, name: &str) -> Option<String> {
    parsed
        .headers
        .get_first_value(name)
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn is_attachment(part: &ParsedMail<'_>) -> bool {
    part.subparts.is_empty()
        && matches!(
            part.get_content_disposition().disposition,
            DispositionType::Attachment
        )
}

/// Attachment leaves in depth-first MIME order.
fn attachment_parts<'p, 'a>(root: &'p ParsedMail<'a>) -> Vec<&'p ParsedMail<'a>> {
    let mut out = Vec::new();
    collect_attachments(root, &mut out);
    out
}

fn collect_attachments<'p, 'a>(part: &'p ParsedMail<'a>, out: &mut Vec<&'p ParsedMail<'a>>) {
    if is_attachment(part) {
        out.push(part);
    }
    for child in &part.subparts {
        collect_attachments(child, out);
    }
}

fn part_filename(part: &ParsedMail<'_>) -> String {
    part.get_content_disposition()
        .params
        .get("filename")
        .or_else(|| part.ctype.params.get("name"))
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .unwrap_or_else(|| UNNAMED_ATTACHMENT.to_string())
}

fn part_content_type(part: &ParsedMail<'_>) -> String {
    let mimetype = part.ctype.mimetype.trim();
    if mimetype.is_empty() {
        DEFAULT_CONTENT_TYPE.to_string()
    } else {
        mimetype.to_ascii_lowercase()
    }
}

fn content_id(part: &ParsedMail<'_>) -> Option<String> {
    part.headers
        .get_first_value("Content-ID")
        .map(|cid| cid.trim().trim_start_matches('<').trim_end_matches('>').to_string())
        .filter(|cid| !cid.is_empty())
}

fn decode(part: &ParsedMail<'_>, filename: &str) -> Result<Vec<u8>> {
    part.get_body_raw()
        .map_err(|e| Error::Parse(format!("Failed to decode attachment {filename}: {e}")))
}

fn primary_text(parsed: &ParsedMail<'_>) -> Result<String> {
    let Some(part) =
        find_text_part(parsed, "text/plain").or_else(|| find_text_part(parsed, "text/html"))
    else {
        return Ok(String::new());
    };
    part.get_body()
        .map_err(|e| Error::Parse(format!("Failed to decode {} body: {e}", part.ctype.mimetype)))
}

fn find_text_part<'p, 'a>(part: &'p ParsedMail<'a>, mimetype: &str) -> Option<&'p ParsedMail<'a>> {
    if part.subparts.is_empty() {
        let matches = part.ctype.mimetype.eq_ignore_ascii_case(mimetype) && !is_attachment(part);
        return matches.then_some(part);
    }
    part.subparts
        .iter()
        .find_map(|child| find_text_part(child, mimetype))
}
