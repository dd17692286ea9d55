use std::{future::Future, pin::Pin};

use tracing::{error, info};

use crate::{EmailMessage, MailgunTransport, TransportConfig, TransportResult};

/// Boxed future type for handler operations, enabling object safety.
pub type HandlerFuture<'a> = Pin<Box<dyn Future<Output = TransportResult<()>> + Send + 'a>>;

/// Named delivery capability consumed by a host mail pipeline.
///
/// The name and version are informational, they let the pipeline report
/// which transport handled a message.
pub trait MessageHandler: Send + Sync {
    /// Delivers an outgoing email message.
    fn handle<'a>(&'a self, message: &'a EmailMessage) -> HandlerFuture<'a>;

    /// Returns the name of this handler.
    fn name(&self) -> &str;

    /// Returns the version of this handler.
    fn version(&self) -> &str;
}

/// Message handler that delivers emails through a [`MailgunTransport`].
///
/// The pipeline hands out shared references, so the message is cloned
/// before the transport rewrites its `Message-Id`.
pub struct MailgunHandler {
    transport: MailgunTransport,
}

impl MailgunHandler {
    pub fn new(config: TransportConfig) -> Self {
        Self::from_transport(MailgunTransport::new(config))
    }

    pub fn from_transport(transport: MailgunTransport) -> Self {
        info!(
            name = transport.name(),
            version = transport.version(),
            "Mailgun handler initialized"
        );
        Self { transport }
    }

    /// Returns a reference to the underlying transport.
    pub fn transport(&self) -> &MailgunTransport {
        &self.transport
    }
}

impl MessageHandler for MailgunHandler {
    fn handle<'a>(&'a self, message: &'a EmailMessage) -> HandlerFuture<'a> {
        Box::pin(async move {
            let mut outgoing = message.clone();
            let sent = self.transport.send(&mut outgoing).await.inspect_err(|e| {
                error!(
                    from = %message.from,
                    error = %e,
                    "Failed to deliver email through Mailgun"
                );
            })?;
            info!(
                message_id = sent.message_id.as_deref().unwrap_or_default(),
                from = %message.from,
                rcpts = message.to.len(),
                "Delivered email through Mailgun"
            );
            Ok(())
        })
    }

    fn name(&self) -> &str {
        self.transport.name()
    }

    fn version(&self) -> &str {
        self.transport.version()
    }
}
