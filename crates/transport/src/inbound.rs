//! Parsing of inbound message webhooks.
//!
//! Mailgun posts received messages to the route's forward URL as form
//! fields. [`parse_message`] maps those fields onto an [`InboundMessage`].

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

/// Webhook field names as delivered by Mailgun.
pub mod fields {
    pub const MESSAGE_ID: &str = "Message-Id";
    pub const SENDER: &str = "sender";
    pub const RECIPIENT: &str = "recipient";
    pub const SUBJECT: &str = "subject";
    pub const STRIPPED_HTML: &str = "stripped-html";
    pub const STRIPPED_TEXT: &str = "stripped-text";
    pub const MESSAGE_HEADERS: &str = "message-headers";
    pub const USER_AGENT: &str = "User-Agent";
    pub const REFERENCES: &str = "References";
    pub const VARIABLES: &str = "X-Mailgun-Variables";
}

/// Flat record derived from an inbound webhook payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InboundMessage {
    /// `Message-Id` without angle brackets and surrounding whitespace.
    pub external_id: String,
    pub from: Option<String>,
    pub to: Option<String>,
    pub subject: Option<String>,
    pub html_body: Option<String>,
    pub text_body: Option<String>,
    /// Headers decoded from the JSON encoded `message-headers` field.
    pub message_headers: Vec<(String, String)>,
    pub user_agent: Option<String>,
    pub references: Option<String>,
    /// Custom variables decoded from the JSON encoded `X-Mailgun-Variables`.
    pub variables: HashMap<String, Value>,
}

/// Errors raised while decoding a webhook payload.
#[derive(Debug, Error)]
pub enum InboundError {
    #[error("missing required field '{0}'")]
    MissingField(&'static str),

    #[error("invalid JSON in field '{field}': {source}")]
    InvalidJson {
        field: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl InboundMessage {
    /// Decodes webhook form fields, reporting a missing `Message-Id` or
    /// malformed JSON fields as an [`InboundError`].
    pub fn try_from_fields(values: &HashMap<String, String>) -> Result<Self, InboundError> {
        let message_id = values
            .get(fields::MESSAGE_ID)
            .ok_or(InboundError::MissingField(fields::MESSAGE_ID))?;
        let text = |name: &str| values.get(name).cloned();

        Ok(Self {
            external_id: strip_brackets(message_id),
            from: text(fields::SENDER),
            to: text(fields::RECIPIENT),
            subject: text(fields::SUBJECT),
            html_body: text(fields::STRIPPED_HTML),
            text_body: text(fields::STRIPPED_TEXT),
            message_headers: json_field(values, fields::MESSAGE_HEADERS)?,
            user_agent: text(fields::USER_AGENT),
            references: text(fields::REFERENCES),
            variables: json_field(values, fields::VARIABLES)?,
        })
    }
}

/// Parses an inbound webhook payload into an [`InboundMessage`].
///
/// Absent or empty `message-headers` and `X-Mailgun-Variables` fields decode
/// to an empty list and an empty map respectively.
///
/// # Panics
///
/// Panics when the payload has no `Message-Id` field or when one of the JSON
/// encoded fields is malformed, both being contract violations of the
/// webhook caller. Use [`InboundMessage::try_from_fields`] to handle them.
pub fn parse_message(values: &HashMap<String, String>) -> InboundMessage {
    match InboundMessage::try_from_fields(values) {
        Ok(message) => message,
        Err(e) => panic!("invalid inbound payload: {e}"),
    }
}

/// Drops one `<` and one `>` (the first occurrence of each) plus the
/// surrounding whitespace.
fn strip_brackets(value: &str) -> String {
    value
        .replacen('<', "", 1)
        .replacen('>', "", 1)
        .trim()
        .to_string()
}

fn json_field<T>(values: &HashMap<String, String>, field: &'static str) -> Result<T, InboundError>
where
    T: serde::de::DeserializeOwned + Default,
{
    match values.get(field).map(|v| v.trim()) {
        None | Some("") => Ok(T::default()),
        Some(raw) => {
            serde_json::from_str(raw).map_err(|source| InboundError::InvalidJson { field, source })
        }
    }
}
