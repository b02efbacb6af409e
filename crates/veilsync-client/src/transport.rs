//! Policy service transport.
//!
//! [`PolicyTransport`] is the seam between the coordinator and the network.
//! [`HttpPolicyTransport`] is the production implementation; tests
//! substitute scripted doubles.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;
use veilsync_domain::model::codec::{decode_snapshot, encode_request};
use veilsync_domain::{DomainError, PendingRequest, PolicySnapshot};

use crate::config::TransportSettings;

/// Errors talking to the policy service.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The endpoint URL could not be used.
    #[error("invalid endpoint {url}: {message}")]
    InvalidEndpoint { url: String, message: String },

    /// Connection, TLS or protocol failure.
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// No answer within the configured timeout.
    #[error("request timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The server answered with a non-2xx status.
    #[error("server returned status {status}")]
    Status { status: u16 },

    /// The request could not be encoded or the response decoded.
    #[error("malformed payload: {0}")]
    Codec(#[from] DomainError),
}

/// Sends sync requests to the policy service.
#[async_trait]
pub trait PolicyTransport: Send + Sync + 'static {
    /// POSTs `request` and decodes the returned snapshot.
    ///
    /// Non-2xx statuses and undecodable bodies are errors.
    async fn fetch(&self, request: &PendingRequest) -> Result<PolicySnapshot, TransportError>;

    /// Issues a plain GET and returns the status code, whatever it is.
    async fn get_status(&self, url: &Url) -> Result<u16, TransportError>;
}

/// [`PolicyTransport`] over HTTPS with `reqwest`.
#[derive(Debug, Clone)]
pub struct HttpPolicyTransport {
    client: reqwest::Client,
    settings_url: Url,
    timeout: Duration,
}

impl HttpPolicyTransport {
    /// Creates a transport posting to `settings_url`.
    pub fn new(settings_url: &str, timeout: Duration) -> Result<Self, TransportError> {
        let parsed = Url::parse(settings_url).map_err(|e| TransportError::InvalidEndpoint {
            url: settings_url.to_string(),
            message: e.to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|source| TransportError::Http {
                url: settings_url.to_string(),
                source,
            })?;

        Ok(Self {
            client,
            settings_url: parsed,
            timeout,
        })
    }

    pub fn from_settings(settings: &TransportSettings) -> Result<Self, TransportError> {
        Self::new(&settings.settings_url, settings.request_timeout())
    }

    pub fn settings_url(&self) -> &Url {
        &self.settings_url
    }

    fn map_send_error(&self, url: &Url, source: reqwest::Error) -> TransportError {
        if source.is_timeout() {
            TransportError::Timeout {
                timeout: self.timeout,
            }
        } else {
            TransportError::Http {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[async_trait]
impl PolicyTransport for HttpPolicyTransport {
    #[instrument(skip(self, request), fields(user_id = request.user_id()))]
    async fn fetch(&self, request: &PendingRequest) -> Result<PolicySnapshot, TransportError> {
        let body = encode_request(request)?;
        let url = &self.settings_url;

        let response = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status {
                status: status.as_u16(),
            });
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| self.map_send_error(url, e))?;
        debug!(status = status.as_u16(), len = bytes.len(), "Policy response received");

        Ok(decode_snapshot(&bytes)?)
    }

    #[instrument(skip(self), fields(url = %url))]
    async fn get_status(&self, url: &Url) -> Result<u16, TransportError> {
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| self.map_send_error(url, e))?;

        Ok(response.status().as_u16())
    }
}
