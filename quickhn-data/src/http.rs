//! `reqwest`-backed [`Transport`].
//!
//! One [`HttpTransport`] is normally shared by every adapter built from a
//! sources file so that they reuse a single connection pool.

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use quickhn_core::SourceError;
use reqwest::Client;
use reqwest::header::ACCEPT;
use thiserror::Error;

use crate::Transport;

/// Default user agent for provider requests.
pub const DEFAULT_USER_AGENT: &str = "quickhn/0.1";

/// Default request timeout in seconds.
const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Errors raised while constructing HTTP-backed sources.
#[derive(Debug, Error)]
pub enum BuildSourceError {
    /// The HTTP client could not be built.
    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),
}

/// Configuration for [`HttpTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpSourceConfig {
    /// Connect and request timeout.
    pub timeout: Duration,
    /// User agent sent with every request.
    pub user_agent: String,
}

impl Default for HttpSourceConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

impl HttpSourceConfig {
    /// Set the request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set the user agent string.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

/// HTTP GET transport built on a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    config: HttpSourceConfig,
}

impl HttpTransport {
    /// Build a transport with default settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn new() -> Result<Self, BuildSourceError> {
        Self::with_config(HttpSourceConfig::default())
    }

    /// Build a transport with explicit settings.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client fails to build.
    pub fn with_config(config: HttpSourceConfig) -> Result<Self, BuildSourceError> {
        let client = Client::builder()
            .user_agent(&config.user_agent)
            .connect_timeout(config.timeout)
            .timeout(config.timeout)
            .build()
            .map_err(BuildSourceError::HttpClient)?;
        Ok(Self { client, config })
    }

    /// Settings the transport was built with.
    #[must_use]
    pub const fn config(&self) -> &HttpSourceConfig {
        &self.config
    }

    fn convert_reqwest_error(&self, error: &reqwest::Error, url: &str) -> SourceError {
        if error.is_timeout() {
            return SourceError::Timeout {
                target: url.to_owned(),
                timeout_secs: self.config.timeout.as_secs(),
            };
        }

        if let Some(status) = error.status() {
            return SourceError::HttpStatus {
                url: url.to_owned(),
                status: status.as_u16(),
                message: error.to_string(),
            };
        }

        if error.is_decode() || error.is_body() {
            return SourceError::UpstreamFormat {
                url: url.to_owned(),
                message: error.to_string(),
            };
        }

        SourceError::Network {
            url: url.to_owned(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn get_text(&self, url: &str) -> Result<String, SourceError> {
        debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .header(ACCEPT, "application/json, text/plain;q=0.9, */*;q=0.5")
            .send()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))?
            .error_for_status()
            .map_err(|err| self.convert_reqwest_error(&err, url))?;
        response
            .text()
            .await
            .map_err(|err| self.convert_reqwest_error(&err, url))
    }
}
