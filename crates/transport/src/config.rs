use std::{fmt, fs, path::Path};

use serde::Deserialize;

/// Default Mailgun API base path.
pub const DEFAULT_BASE_URL: &str = "https://api.mailgun.net/v2";

/// Top-level configuration file layout, with a single `[mailgun]` table.
#[derive(Debug, Deserialize)]
pub struct Config {
    pub mailgun: TransportConfig,
}

/// Immutable configuration of a [`MailgunTransport`](crate::MailgunTransport).
///
/// Every field is optional: without an API key requests are rejected by the
/// remote service, and without a domain the account-level base path is used
/// and `Message-Id` rewriting is disabled.
#[derive(Clone, Deserialize)]
pub struct TransportConfig {
    /// Secret API key, sent as the basic auth password of user `api`.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Sending domain, scopes the API base path when present.
    #[serde(default)]
    pub domain: Option<String>,

    /// Forwarded to the send call as `o:testmode`.
    #[serde(default)]
    pub test_mode: bool,

    /// API base path, without the domain suffix.
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl TransportConfig {
    /// Creates a configuration holding only an API key.
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: Some(api_key.into()),
            ..Self::default()
        }
    }

    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn with_test_mode(mut self, test_mode: bool) -> Self {
        self.test_mode = test_mode;
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Returns the configured domain, treating an empty string as absent.
    pub fn domain(&self) -> Option<&str> {
        self.domain.as_deref().filter(|d| !d.is_empty())
    }

    /// Returns the API key, or an empty string when none is configured.
    pub fn api_key(&self) -> &str {
        self.api_key.as_deref().unwrap_or_default()
    }

    /// Returns the base path for API calls, suffixed with `/<domain>` when
    /// a domain is configured.
    pub fn api_base(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        match self.domain() {
            Some(domain) => format!("{base}/{domain}"),
            None => base.to_string(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            domain: None,
            test_mode: false,
            base_url: default_base_url(),
        }
    }
}

impl fmt::Debug for TransportConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("domain", &self.domain)
            .field("test_mode", &self.test_mode)
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// Loads configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = fs::read_to_string(path).map_err(ConfigError::Io)?;
    parse_config(&content)
}

/// Parses configuration from a TOML string.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    toml::from_str(content).map_err(ConfigError::Parse)
}

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config I/O error: {0}")]
    Io(#[source] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[source] toml::de::Error),
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}
