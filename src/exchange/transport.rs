//! HTTP transport for the STS round trip.

use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use tracing::debug;

use crate::error::StsError;

/// Status and body of an STS reply, before interpretation.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: Bytes,
}

/// Performs the token exchange POST.
///
/// Implementations send exactly one request per call and never retry.
#[async_trait]
pub trait ExchangeTransport: Send + Sync {
    /// POST `form_body` (form-urlencoded) to `endpoint`.
    async fn send(&self, endpoint: &str, form_body: String) -> Result<RawResponse, StsError>;
}

/// [`ExchangeTransport`] backed by a caller-supplied `reqwest::Client`.
///
/// Proxy, TLS and timeout settings come from the client.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http_client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(http_client: reqwest::Client) -> Self {
        Self { http_client }
    }

    /// Client used when the embedder does not supply one.
    ///
    /// Redirects are disabled and requests time out after 30 seconds.
    pub fn default_client() -> Result<reqwest::Client, StsError> {
        reqwest::Client::builder()
            .redirect(reqwest::redirect::Policy::none())
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| StsError::Configuration(format!("Failed to create HTTP client: {}", e)))
    }
}

#[async_trait]
impl ExchangeTransport for ReqwestTransport {
    async fn send(&self, endpoint: &str, form_body: String) -> Result<RawResponse, StsError> {
        debug!(url = %endpoint, "Sending token exchange request");

        let response = self
            .http_client
            .post(endpoint)
            .header(
                reqwest::header::CONTENT_TYPE,
                "application/x-www-form-urlencoded",
            )
            .body(form_body)
            .send()
            .await
            .map_err(|e| StsError::Transport(Box::new(e)))?;

        let status = response.status().as_u16();
        let body = response
            .bytes()
            .await
            .map_err(|e| StsError::Transport(Box::new(e)))?;

        debug!(url = %endpoint, status, "Token exchange response received");

        Ok(RawResponse { status, body })
    }
}
