//! Error taxonomy shared by every networked operation of the transport.

use thiserror::Error;

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors that can occur while talking to the Mailgun API.
#[derive(Debug, Error)]
pub enum TransportError {
    /// A required argument was missing, no request was issued.
    #[error("{0}")]
    Validation(String),

    /// The HTTP request could not be completed (connect, timeout, decode).
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The API answered with a non-2xx status.
    #[error("{message}")]
    Status { status: u16, message: String },

    /// Reading the outgoing MIME stream failed, nothing was submitted.
    #[error("Stream error: {0}")]
    Stream(#[source] std::io::Error),

    /// A successful response did not carry an expected field.
    #[error("Unexpected response: {0}")]
    Response(String),
}

impl TransportError {
    /// Builds a [`TransportError::Status`] from a status code and the
    /// response body, falling back to a generic message for empty bodies.
    pub fn status(status: u16, body: &str) -> Self {
        let message = if body.trim().is_empty() {
            format!("status code {status}")
        } else {
            body.to_string()
        };
        TransportError::Status { status, message }
    }

    /// Returns the HTTP status code when the error came from a response.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            TransportError::Status { status, .. } => Some(*status),
            TransportError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
