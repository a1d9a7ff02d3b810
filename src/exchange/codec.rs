//! Token exchange wire format (RFC 8693).

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use super::config::StsConfig;
use crate::error::StsError;
use crate::token::Token;

/// Token exchange grant type (RFC 8693).
pub const GRANT_TYPE_TOKEN_EXCHANGE: &str = "urn:ietf:params:oauth:grant-type:token-exchange";

/// Token exchange request (form-urlencoded body).
#[derive(Debug, Serialize)]
pub struct TokenExchangeRequest<'a> {
    /// Always "urn:ietf:params:oauth:grant-type:token-exchange".
    pub grant_type: &'static str,
    /// Target audience for the new token.
    pub audience: &'a str,
    /// Target resource.
    pub resource: &'a str,
    /// Requested scopes.
    pub scope: &'a str,
    /// The subject token to exchange.
    pub subject_token: &'a str,
    /// Type of the subject token (URN).
    pub subject_token_type: &'a str,
    /// Requested token type (URN).
    pub requested_token_type: &'a str,
}

impl<'a> TokenExchangeRequest<'a> {
    pub fn new(config: &'a StsConfig, subject_token: &'a str) -> Self {
        Self {
            grant_type: GRANT_TYPE_TOKEN_EXCHANGE,
            audience: &config.audience,
            resource: &config.resource,
            scope: &config.scope,
            subject_token,
            subject_token_type: &config.subject_token_type,
            requested_token_type: &config.requested_token_type,
        }
    }
}

/// Token exchange response (JSON, RFC 8693 section 2.2.1).
#[derive(Debug, Deserialize)]
pub struct TokenExchangeResponse {
    /// The issued token.
    pub access_token: String,
    /// Type of token issued (URN).
    #[serde(default)]
    pub issued_token_type: String,
    /// Token type as declared by the server.
    #[serde(default)]
    pub token_type: Option<String>,
    /// Lifetime in seconds.
    #[serde(default)]
    pub expires_in: Option<i64>,
    /// Scopes of the issued token.
    #[serde(default)]
    pub scope: Option<String>,
    /// Refresh token, if any.
    #[serde(default)]
    pub refresh_token: Option<String>,
}

/// Build the form-urlencoded exchange body.
pub fn encode_request(config: &StsConfig, subject_token: &str) -> Result<String, StsError> {
    let request = TokenExchangeRequest::new(config, subject_token);
    Ok(serde_urlencoded::to_string(&request)?)
}

/// Turn an STS reply into a token.
///
/// `received_at` is the instant the response arrived; `expires_in` is
/// counted from there and a missing value counts as zero, so every issued
/// token carries an expiry. The server's `token_type` is ignored and the
/// token is always reported as a bearer token.
pub fn decode_response(
    status: u16,
    body: &[u8],
    received_at: DateTime<Utc>,
) -> Result<Token, StsError> {
    if status != 200 {
        return Err(StsError::ExchangeRejected {
            status,
            body: String::from_utf8_lossy(body).into_owned(),
        });
    }

    let response: TokenExchangeResponse = serde_json::from_slice(body)?;

    if response.access_token.is_empty() {
        return Err(StsError::decode("response has an empty access_token"));
    }

    // No declared lifetime means the token is good for this call only.
    let secs = response.expires_in.unwrap_or(0);
    let expiry = TimeDelta::try_seconds(secs.max(0))
        .and_then(|lifetime| received_at.checked_add_signed(lifetime))
        .ok_or_else(|| StsError::decode(format!("expires_in out of range: {}", secs)))?;

    Ok(Token::bearer(response.access_token, Some(expiry)))
}
