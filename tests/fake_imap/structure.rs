//! BODYSTRUCTURE rendering for the fake server.
//!
//! Real servers compute BODYSTRUCTURE from the stored message. We do
//! the same by parsing the raw bytes with `mailparse` and printing the
//! tree in RFC 3501 Section 7.4.2 form:
//!
//! ```text
//! (("TEXT" "PLAIN" ("CHARSET" "utf-8") NIL NIL "7BIT" 5 1 NIL NIL)
//!  ("APPLICATION" "PDF" ("NAME" "a.pdf") NIL NIL "BASE64" 120 NIL
//!   ("ATTACHMENT" ("FILENAME" "a.pdf"))) "MIXED")
//! ```
//!
//! Sizes are decoded byte counts rather than transfer-encoded ones.
//! `message/rfc822` parts are rendered as `application/octet-stream`
//! so no envelope has to be produced.

use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

/// Render the BODYSTRUCTURE of a raw message, or `None` if it does not
/// parse.
pub fn body_structure(raw: &[u8]) -> Option<String> {
    let parsed = mailparse::parse_mail(raw).ok()?;
    Some(render(&parsed))
}

fn render(part: &ParsedMail<'_>) -> String {
    let mimetype = part.ctype.mimetype.to_ascii_lowercase();
    let (ty, subtype) = mimetype.split_once('/').unwrap_or(("text", "plain"));

    if ty == "multipart" && !part.subparts.is_empty() {
        let children: String = part.subparts.iter().map(render).collect();
        return format!("({children} {})", quote(&subtype.to_ascii_uppercase()));
    }

    let (ty, subtype) = if mimetype == "message/rfc822" {
        ("application", "octet-stream")
    } else {
        (ty, subtype)
    };

    let size = part.get_body_raw().map_or(0, |body| body.len());
    let encoding = part
        .headers
        .get_first_value("Content-Transfer-Encoding")
        .map_or_else(|| "7BIT".to_string(), |e| e.trim().to_ascii_uppercase());
    let id = part.headers.get_first_value("Content-ID");

    let mut out = format!(
        "({} {} {} {} NIL {} {size}",
        quote(&ty.to_ascii_uppercase()),
        quote(&subtype.to_ascii_uppercase()),
        params(part.ctype.params.iter()),
        nstring(id.as_deref().map(str::trim)),
        quote(&encoding),
    );

    if ty == "text" {
        let lines = part.get_body().map_or(0, |body| body.lines().count());
        out.push_str(&format!(" {lines}"));
    }

    // body-fld-md5, then body-fld-dsp
    out.push_str(" NIL ");
    out.push_str(&disposition(part));
    out.push(')');
    out
}

fn disposition(part: &ParsedMail<'_>) -> String {
    if part
        .headers
        .get_first_value("Content-Disposition")
        .is_none()
    {
        return "NIL".to_string();
    }

    let parsed = part.get_content_disposition();
    let kind = match &parsed.disposition {
        DispositionType::Inline => "INLINE".to_string(),
        DispositionType::Attachment => "ATTACHMENT".to_string(),
        DispositionType::FormData => "FORM-DATA".to_string(),
        DispositionType::Extension(other) => other.to_ascii_uppercase(),
    };
    format!("({} {})", quote(&kind), params(parsed.params.iter()))
}

/// `("KEY" "value" ...)` sorted by key, or `NIL` when empty.
fn params<'a>(pairs: impl Iterator<Item = (&'a String, &'a String)>) -> String {
    let mut pairs: Vec<_> = pairs.collect();
    if pairs.is_empty() {
        return "NIL".to_string();
    }
    pairs.sort();
    let inner: Vec<String> = pairs
        .into_iter()
        .flat_map(|(k, v)| [quote(&k.to_ascii_uppercase()), quote(v)])
        .collect();
    format!("({})", inner.join(" "))
}

fn nstring(value: Option<&str>) -> String {
    value.map_or_else(|| "NIL".to_string(), quote)
}

fn quote(value: &str) -> String {
    format!("\"{}\"", value.replace('\\', "\\\\").replace('"', "\\\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_text_part() {
        let raw = b"Subject: x\r\nContent-Type: text/plain; charset=utf-8\r\n\r\nhello\r\n";
        let bs = body_structure(raw).unwrap();
        assert!(bs.starts_with("(\"TEXT\" \"PLAIN\" (\"CHARSET\" \"utf-8\") NIL NIL \"7BIT\" "));
        assert!(bs.ends_with(" 1 NIL NIL)"));
    }

    #[test]
    fn multipart_with_attachment() {
        let raw = b"Content-Type: multipart/mixed; boundary=\"b\"\r\n\r\n\
--b\r\nContent-Type: text/plain\r\n\r\nhi\r\n\
--b\r\nContent-Type: application/pdf\r\n\
Content-Disposition: attachment; filename=\"a.pdf\"\r\n\r\nPDF\r\n\
--b--\r\n";
        let bs = body_structure(raw).unwrap();
        assert!(bs.starts_with("((\"TEXT\" \"PLAIN\""));
        assert!(bs.contains("(\"ATTACHMENT\" (\"FILENAME\" \"a.pdf\"))"));
        assert!(bs.ends_with(" \"MIXED\")"));
    }

    #[test]
    fn quotes_are_escaped() {
        assert_eq!(quote("a\"b"), "\"a\\\"b\"");
    }
}
