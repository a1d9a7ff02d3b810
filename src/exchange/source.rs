//! Caching token exchange source.
//!
//! [`StsTokenSource`] hands out the cached issued token while it is valid and
//! performs a fresh exchange otherwise. The cache lock is held for the whole
//! exchange, so one instance never has more than one request in flight and
//! concurrent callers queue behind it.

use async_trait::async_trait;
use chrono::{TimeDelta, Utc};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::codec::{decode_response, encode_request};
use super::config::StsConfig;
use super::transport::{ExchangeTransport, ReqwestTransport};
use crate::error::StsError;
use crate::subject::TokenSource;
use crate::token::Token;

/// Exchanges subject tokens for access tokens and caches the result.
pub struct StsTokenSource {
    config: StsConfig,
    subject_token_source: Arc<dyn TokenSource>,
    transport: Arc<dyn ExchangeTransport>,
    expiry_skew: TimeDelta,
    /// Last issued token. Read and written only under this lock.
    cached: Mutex<Option<Token>>,
}

impl StsTokenSource {
    /// Create a source that exchanges through `http_client`.
    pub fn new(
        config: StsConfig,
        subject_token_source: Arc<dyn TokenSource>,
        http_client: reqwest::Client,
    ) -> Result<Self, StsError> {
        Self::builder(config)
            .subject_token_source(subject_token_source)
            .http_client(http_client)
            .build()
    }

    pub fn builder(config: StsConfig) -> StsTokenSourceBuilder {
        StsTokenSourceBuilder {
            config,
            subject_token_source: None,
            http_client: None,
            transport: None,
        }
    }

    pub fn config(&self) -> &StsConfig {
        &self.config
    }

    /// Return a valid access token, exchanging a new one if needed.
    ///
    /// Failures leave the cache as it was; nothing is retried.
    pub async fn token(&self) -> Result<Token, StsError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref().filter(|t| self.is_fresh(t)) {
            debug!(audience = %self.config.audience, "Using cached STS token");
            return Ok(token.clone());
        }

        let token = self.exchange().await?;

        *cached = if self.is_fresh(&token) {
            Some(token.clone())
        } else {
            None
        };

        Ok(token)
    }

    /// The currently cached token, valid or not.
    pub async fn cached_token(&self) -> Option<Token> {
        self.cached.lock().await.clone()
    }

    /// Valid for at least the configured skew. A horizon past the end of
    /// time counts as stale.
    fn is_fresh(&self, token: &Token) -> bool {
        Utc::now()
            .checked_add_signed(self.expiry_skew)
            .is_some_and(|horizon| token.is_valid_at(horizon))
    }

    async fn exchange(&self) -> Result<Token, StsError> {
        let subject = self
            .subject_token_source
            .token()
            .await
            .map_err(|e| StsError::SubjectToken(e.into()))?;

        debug!(
            url = %self.config.token_exchange_service_uri,
            audience = %self.config.audience,
            "Exchanging subject token"
        );

        let form_body = encode_request(&self.config, &subject.access_token)?;
        let response = self
            .transport
            .send(&self.config.token_exchange_service_uri, form_body)
            .await?;
        let token = decode_response(response.status, &response.body, Utc::now())?;

        info!(
            audience = %self.config.audience,
            expiry = ?token.expiry,
            "STS token exchange successful"
        );

        Ok(token)
    }
}

impl fmt::Debug for StsTokenSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StsTokenSource")
            .field("config", &self.config)
            .field("expiry_skew", &self.expiry_skew)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for StsTokenSource {
    async fn token(&self) -> anyhow::Result<Token> {
        Ok(StsTokenSource::token(self).await?)
    }
}

/// Builder for [`StsTokenSource`].
pub struct StsTokenSourceBuilder {
    config: StsConfig,
    subject_token_source: Option<Arc<dyn TokenSource>>,
    http_client: Option<reqwest::Client>,
    transport: Option<Arc<dyn ExchangeTransport>>,
}

impl StsTokenSourceBuilder {
    /// Provider of the token presented to the STS. Required.
    pub fn subject_token_source(mut self, source: Arc<dyn TokenSource>) -> Self {
        self.subject_token_source = Some(source);
        self
    }

    /// HTTP client used for the exchange POST.
    pub fn http_client(mut self, client: reqwest::Client) -> Self {
        self.http_client = Some(client);
        self
    }

    /// Replace the HTTP transport entirely. Takes precedence over `http_client`.
    pub fn transport(mut self, transport: Arc<dyn ExchangeTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Validate the configuration and build the source. Performs no I/O.
    pub fn build(self) -> Result<StsTokenSource, StsError> {
        let subject_token_source = self
            .subject_token_source
            .ok_or_else(|| StsError::Configuration("subject token source is required".into()))?;

        self.config.validate().map_err(StsError::Configuration)?;

        let expiry_skew = i64::try_from(self.config.expiry_skew_secs)
            .ok()
            .and_then(TimeDelta::try_seconds)
            .filter(|skew| Utc::now().checked_add_signed(*skew).is_some())
            .ok_or_else(|| {
                StsError::Configuration(format!(
                    "expiry_skew_secs out of range: {}",
                    self.config.expiry_skew_secs
                ))
            })?;

        let transport: Arc<dyn ExchangeTransport> = match (self.transport, self.http_client) {
            (Some(transport), _) => transport,
            (None, Some(client)) => Arc::new(ReqwestTransport::new(client)),
            (None, None) => Arc::new(ReqwestTransport::new(ReqwestTransport::default_client()?)),
        };

        Ok(StsTokenSource {
            config: self.config,
            subject_token_source,
            transport,
            expiry_skew,
            cached: Mutex::new(None),
        })
    }
}
