//! Outgoing delivery through the Mailgun `messages.mime` endpoint.

use std::{collections::HashMap, sync::Arc};

use reqwest::{
    multipart::{Form, Part},
    Client, Method, RequestBuilder, Response,
};
use serde::Deserialize;
use tokio::io::AsyncReadExt;
use tracing::{debug, error, info};

use crate::{
    inbound, normalize_message_id, rewrite_message_id, signature, InboundMessage,
    OutgoingMessage, TransportConfig, TransportError, TransportResult, MESSAGE_ID_HEADER,
};

/// Username used for basic auth against the Mailgun API.
pub const API_USER: &str = "api";

/// Result of a successful send.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendInfo {
    /// Id reported by Mailgun, or the outgoing `Message-Id` when the
    /// response carried none. Angle brackets and whitespace are stripped.
    pub message_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    id: Option<String>,
}

/// Mailgun transport holding an immutable [`TransportConfig`].
///
/// Stateless across calls, cloning shares the configuration and the
/// underlying HTTP connection pool so that many sends may run concurrently.
#[derive(Debug, Clone)]
pub struct MailgunTransport {
    config: Arc<TransportConfig>,
    client: Client,
}

impl MailgunTransport {
    pub const NAME: &'static str = "Mailgun";
    pub const VERSION: &'static str = env!("CARGO_PKG_VERSION");

    /// Creates a new [`MailgunTransport`] with its own HTTP client.
    pub fn new(config: TransportConfig) -> Self {
        Self::with_client(config, Client::new())
    }

    /// Creates a new [`MailgunTransport`] reusing an existing HTTP client.
    pub fn with_client(config: TransportConfig, client: Client) -> Self {
        info!(
            base = %config.api_base(),
            domain = config.domain().unwrap_or_default(),
            test_mode = config.test_mode,
            "Mailgun transport initialized"
        );
        Self {
            config: Arc::new(config),
            client,
        }
    }

    pub fn name(&self) -> &str {
        Self::NAME
    }

    pub fn version(&self) -> &str {
        Self::VERSION
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Sends a message through the `messages.mime` endpoint.
    ///
    /// When a domain is configured the `Message-Id` header of `message` is
    /// rewritten in place to use that domain before anything else happens.
    /// The MIME stream is then drained completely, a read failure aborts
    /// with [`TransportError::Stream`] and no request is issued. A single
    /// attempt is made, non-2xx responses become [`TransportError::Status`].
    pub async fn send<M>(&self, message: &mut M) -> TransportResult<SendInfo>
    where
        M: OutgoingMessage + ?Sized,
    {
        if let Some(domain) = self.config.domain() {
            rewrite_message_id(message, domain);
        }

        debug!("Preparing EML");
        let mut eml = Vec::new();
        message.reader().read_to_end(&mut eml).await.map_err(|e| {
            error!(error = %e, "Error on preparing EML");
            TransportError::Stream(e)
        })?;

        let to = message.envelope().to.joined();
        let test_mode = if self.config.test_mode { "yes" } else { "no" };
        let size = eml.len();
        let part = Part::bytes(eml)
            .file_name("message.eml")
            .mime_str("message/rfc822")?;
        let form = Form::new()
            .part("message", part)
            .text("to", to.clone())
            .text("o:testmode", test_mode);

        debug!(to = %to, size = size, "EML is ready, sending now");
        let url = format!("{}/messages.mime", self.config.api_base());
        let response = self.request(Method::POST, &url).multipart(form).send().await;
        let body = match checked_text(response).await {
            Ok(body) => body,
            Err(e) => {
                error!(url = %url, error = %e, "Error on sending email");
                return Err(e);
            }
        };

        let message_id = serde_json::from_str::<SendResponse>(&body)
            .ok()
            .and_then(|r| r.id)
            .or_else(|| message.header(MESSAGE_ID_HEADER).map(str::to_string))
            .map(|id| normalize_message_id(&id));

        info!(
            message_id = message_id.as_deref().unwrap_or_default(),
            to = %to,
            "Sent email message"
        );
        Ok(SendInfo { message_id })
    }

    /// Parses an inbound webhook payload, see [`inbound::parse_message`].
    pub fn parse_message(&self, fields: &HashMap<String, String>) -> InboundMessage {
        inbound::parse_message(fields)
    }

    /// Verifies a webhook signature against the configured API key, see
    /// [`signature::verify_signature`].
    pub fn verify_signature(&self, token: &str, timestamp: &str, signature: &str) -> bool {
        signature::verify_signature(self.config.api_key(), token, timestamp, signature)
    }

    /// Starts an authenticated request against the API.
    pub(crate) fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .basic_auth(API_USER, self.config.api_key.as_deref())
    }
}

/// Resolves a response into its body text, mapping transport failures and
/// non-2xx statuses into [`TransportError`].
pub(crate) async fn checked_text(
    response: Result<Response, reqwest::Error>,
) -> TransportResult<String> {
    let response = response?;
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(TransportError::status(status.as_u16(), &body));
    }
    Ok(body)
}
