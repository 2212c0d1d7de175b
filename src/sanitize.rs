//! Filename sanitising
//!
//! Attachment names come from untrusted mail and must not escape the
//! directory they are saved into.

use crate::message::UNNAMED_ATTACHMENT;

const FORBIDDEN: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Replace characters that are unsafe in file names with `_`, drop
/// trailing dots and surrounding whitespace.
///
/// Never returns an empty string, `.` or `..`.
///
/// # Examples
///
/// ```
/// use imap_attachments::sanitize_filename;
///
/// assert_eq!(sanitize_filename("q1/report?.pdf"), "q1_report_.pdf");
/// assert_eq!(sanitize_filename("notes..."), "notes");
/// assert_eq!(sanitize_filename("   "), "unnamed");
/// ```
#[must_use]
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if FORBIDDEN.contains(&c) || c.is_ascii_control() {
                '_'
            } else {
                c
            }
        })
        .collect();

    let cleaned = replaced.trim().trim_end_matches('.').trim_end();
    if cleaned.is_empty() {
        UNNAMED_ATTACHMENT.to_string()
    } else {
        cleaned.to_string()
    }
}
