//! `Message-Id` normalisation and domain rewriting.
//!
//! Mailgun expects the domain part of an outgoing `Message-Id` to match the
//! sending domain, whatever the composing library generated.

use tracing::debug;

use crate::OutgoingMessage;

/// Name of the header rewritten before sending.
pub const MESSAGE_ID_HEADER: &str = "Message-Id";

/// Removes every angle bracket and whitespace character from an id.
///
/// ```rust
/// assert_eq!(mailgun_transport::normalize_message_id(" <abc@example.com> "), "abc@example.com");
/// ```
pub fn normalize_message_id(value: &str) -> String {
    value
        .chars()
        .filter(|c| !matches!(c, '<' | '>') && !c.is_whitespace())
        .collect()
}

/// Replaces everything after the first `@` of a normalized id with `domain`,
/// appending `@domain` when the id has no `@` at all.
///
/// ```rust
/// use mailgun_transport::with_domain;
///
/// assert_eq!(with_domain("<abc@localhost>", "mg.example.com"), "abc@mg.example.com");
/// assert_eq!(with_domain("abc", "mg.example.com"), "abc@mg.example.com");
/// ```
pub fn with_domain(value: &str, domain: &str) -> String {
    let id = normalize_message_id(value);
    let local = match id.find('@') {
        Some(index) => &id[..index],
        None => id.as_str(),
    };
    format!("{local}@{domain}")
}

/// Rewrites the `Message-Id` header of `message` so that its domain is
/// `domain`, storing it back wrapped in angle brackets.
///
/// A missing header is treated as an empty id. Returns the rewritten id
/// without brackets.
pub fn rewrite_message_id<M>(message: &mut M, domain: &str) -> String
where
    M: OutgoingMessage + ?Sized,
{
    let current = message.header(MESSAGE_ID_HEADER).unwrap_or_default();
    let id = with_domain(current, domain);
    debug!(
        old_id = %current,
        message_id = %id,
        "Rewriting Message-Id to sending domain"
    );
    message.set_header(MESSAGE_ID_HEADER, &format!("<{id}>"));
    id
}
