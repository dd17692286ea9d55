//! Outgoing message types handed to the transport.
//!
//! The transport only needs three things from a message: a readable MIME
//! byte stream, case-insensitive header accessors (the `Message-Id` header
//! may be rewritten before sending) and the SMTP envelope. These are
//! captured by the [`OutgoingMessage`] trait, with [`EmailMessage`] as the
//! bundled in-memory implementation.

use std::pin::Pin;

use tokio::io::AsyncRead;

use crate::{line_ending, parse_header_block, RawHeader};

/// Boxed reader over the full MIME serialization of a message.
pub type MessageReader<'a> = Pin<Box<dyn AsyncRead + Send + 'a>>;

/// Envelope recipients, either as a single (possibly already joined)
/// address string or as a list of addresses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipients {
    Single(String),
    List(Vec<String>),
}

impl Recipients {
    /// Flattens the recipients into a single comma separated string.
    pub fn joined(&self) -> String {
        match self {
            Recipients::Single(address) => address.clone(),
            Recipients::List(addresses) => addresses.join(","),
        }
    }
}

impl From<&str> for Recipients {
    fn from(address: &str) -> Self {
        Recipients::Single(address.to_string())
    }
}

impl From<String> for Recipients {
    fn from(address: String) -> Self {
        Recipients::Single(address)
    }
}

impl From<Vec<String>> for Recipients {
    fn from(addresses: Vec<String>) -> Self {
        Recipients::List(addresses)
    }
}

impl From<&[&str]> for Recipients {
    fn from(addresses: &[&str]) -> Self {
        Recipients::List(addresses.iter().map(|a| a.to_string()).collect())
    }
}

/// Sender and recipients of a transmission, independent of the headers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub from: String,
    pub to: Recipients,
}

/// Source of an outgoing email, as consumed by
/// [`MailgunTransport::send`](crate::MailgunTransport::send).
pub trait OutgoingMessage: Send + Sync {
    /// Returns the first header value matching `name` (case-insensitive).
    fn header(&self, name: &str) -> Option<&str>;

    /// Sets a header value, replacing the first existing occurrence.
    fn set_header(&mut self, name: &str, value: &str);

    /// Returns the envelope of the message.
    fn envelope(&self) -> Envelope;

    /// Returns a reader over the complete MIME message, reflecting any
    /// header changes made so far.
    fn reader(&self) -> MessageReader<'_>;
}

/// In-memory email message with an ordered header list.
///
/// The raw message is the source of truth. Changing a header splices only
/// that header's lines into [`raw`](Self::raw), every other byte goes out
/// exactly as composed.
#[derive(Debug, Clone)]
pub struct EmailMessage {
    /// Envelope sender address.
    pub from: String,

    /// Envelope recipient addresses.
    pub to: Vec<String>,

    headers: Vec<RawHeader>,
    body_start: usize,
    raw: String,
}

impl EmailMessage {
    pub fn new(from: String, to: Vec<String>, raw: String) -> Self {
        let (headers, body_start) = parse_header_block(&raw);
        Self {
            from,
            to,
            headers,
            body_start,
            raw,
        }
    }

    pub fn from_raw(from: &str, to: &[&str], raw: &str) -> Self {
        Self::new(
            from.to_string(),
            to.iter().map(|a| a.to_string()).collect(),
            raw.to_string(),
        )
    }

    /// Returns the first header value matching `name` (case-insensitive).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| header.value.as_str())
    }

    /// Replaces the first header matching `name`, keeping its position,
    /// original key case and line terminator, or prepends a new header when
    /// none exists.
    pub fn set_header(&mut self, name: &str, value: &str) {
        let existing = self
            .headers
            .iter()
            .find(|header| header.name.eq_ignore_ascii_case(name))
            .map(|header| (header.name.clone(), header.span.clone()));

        match existing {
            Some((key, span)) => {
                let current = &self.raw[span.clone()];
                let ending = if current.ends_with("\r\n") {
                    "\r\n"
                } else if current.ends_with('\n') {
                    "\n"
                } else {
                    ""
                };
                let line = format!("{key}: {value}{ending}");
                self.raw.replace_range(span, &line);
            }
            None => {
                let ending = line_ending(&self.raw);
                // a message without headers also needs the blank separator
                let separator = if self.headers.is_empty() && self.body_start == 0 {
                    ending
                } else {
                    ""
                };
                let line = format!("{name}: {value}{ending}{separator}");
                self.raw.insert_str(0, &line);
            }
        }

        let (headers, body_start) = parse_header_block(&self.raw);
        self.headers = headers;
        self.body_start = body_start;
    }

    pub fn subject(&self) -> &str {
        self.header("Subject").unwrap_or_default()
    }

    /// Returns the `Message-Id` header value, if present.
    pub fn message_id(&self) -> Option<&str> {
        self.header("Message-Id")
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn body(&self) -> &str {
        &self.raw[self.body_start..]
    }

    pub fn headers(&self) -> &[RawHeader] {
        &self.headers
    }
}

impl OutgoingMessage for EmailMessage {
    fn header(&self, name: &str) -> Option<&str> {
        EmailMessage::header(self, name)
    }

    fn set_header(&mut self, name: &str, value: &str) {
        EmailMessage::set_header(self, name, value)
    }

    fn envelope(&self) -> Envelope {
        Envelope {
            from: self.from.clone(),
            to: Recipients::List(self.to.clone()),
        }
    }

    fn reader(&self) -> MessageReader<'_> {
        Box::pin(self.raw.as_bytes())
    }
}
