//! Minimal RFC 5322 header handling for outgoing messages.

use std::ops::Range;

/// Header parsed from a raw message, along with the byte range its lines
/// occupy in that message (folded lines and line terminator included).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawHeader {
    pub name: String,
    pub value: String,
    pub span: Range<usize>,
}

/// Parses the header section of a raw email, returning the headers in order
/// and the byte offset at which the content starts.
///
/// Keys keep their original case and values are trimmed. Folded header
/// lines (starting with a space or tab) are joined onto the previous value
/// with a single space, while the span keeps covering the raw folded lines.
/// A non-blank line without a colon ends the header section and is treated
/// as the start of the content.
pub fn parse_header_block(raw: &str) -> (Vec<RawHeader>, usize) {
    let mut headers: Vec<RawHeader> = Vec::new();
    let mut pos = 0;

    for line in raw.lines() {
        let end = pos + line.len();
        let consumed = if raw[end..].starts_with("\r\n") {
            end + 2
        } else if raw[end..].starts_with('\n') {
            end + 1
        } else {
            end
        };

        if line.trim().is_empty() {
            pos = consumed;
            break;
        }

        if line.starts_with(|c: char| c == ' ' || c == '\t') {
            if let Some(header) = headers.last_mut() {
                header.value.push(' ');
                header.value.push_str(line.trim());
                header.span.end = consumed;
                pos = consumed;
                continue;
            }
        }

        match line.split_once(':') {
            Some((key, value)) => headers.push(RawHeader {
                name: key.trim().to_string(),
                value: value.trim().to_string(),
                span: pos..consumed,
            }),
            None => break,
        }

        pos = consumed;
    }

    (headers, pos)
}

/// Splits a raw email into an ordered header list and the content that
/// follows the blank-line separator.
///
/// # Examples
///
/// ```rust
/// let (headers, content) = mailgun_transport::parse_raw_headers(
///     "Message-Id: <abc@example.com>\r\nSubject: Hi\r\n\r\nHello!"
/// );
/// assert_eq!(headers.len(), 2);
/// assert_eq!(headers[0], ("Message-Id".to_string(), "<abc@example.com>".to_string()));
/// assert_eq!(content, "Hello!");
/// ```
pub fn parse_raw_headers(raw: &str) -> (Vec<(String, String)>, &str) {
    let (headers, body_start) = parse_header_block(raw);
    let headers = headers
        .into_iter()
        .map(|header| (header.name, header.value))
        .collect();
    (headers, &raw[body_start..])
}

/// Returns the line terminator used by `raw`, defaulting to CRLF when it
/// has no line break at all.
pub fn line_ending(raw: &str) -> &'static str {
    match raw.find('\n') {
        Some(index) if index > 0 && raw.as_bytes()[index - 1] == b'\r' => "\r\n",
        Some(_) => "\n",
        None => "\r\n",
    }
}
