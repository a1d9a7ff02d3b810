//! Token Exchange source configuration.

use serde::{Deserialize, Serialize};
use url::Url;

/// RFC 8693 token type URN for an OAuth 2.0 access token.
pub const ACCESS_TOKEN_TYPE: &str = "urn:ietf:params:oauth:token-type:access_token";

/// Configuration for an [`StsTokenSource`](super::StsTokenSource) (RFC 8693).
///
/// The subject token provider and HTTP client are supplied through the
/// builder; everything else is plain data that can come from a config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StsConfig {
    /// STS token endpoint.
    pub token_exchange_service_uri: String,

    /// Logical name of the target service.
    #[serde(default)]
    pub audience: String,

    /// URI of the target resource.
    #[serde(default)]
    pub resource: String,

    /// Space-delimited scopes requested for the issued token.
    #[serde(default)]
    pub scope: String,

    /// URN describing the subject token.
    #[serde(default = "default_token_type")]
    pub subject_token_type: String,

    /// URN of the token type requested from the STS.
    #[serde(default = "default_token_type")]
    pub requested_token_type: String,

    /// Treat cached tokens as expired this many seconds early.
    #[serde(default)]
    pub expiry_skew_secs: u64,
}

fn default_token_type() -> String {
    ACCESS_TOKEN_TYPE.to_string()
}

impl Default for StsConfig {
    fn default() -> Self {
        Self {
            token_exchange_service_uri: String::new(),
            audience: String::new(),
            resource: String::new(),
            scope: String::new(),
            subject_token_type: default_token_type(),
            requested_token_type: default_token_type(),
            expiry_skew_secs: 0,
        }
    }
}

impl StsConfig {
    /// Create a configuration for the given endpoint with default token types.
    pub fn new(token_exchange_service_uri: impl Into<String>) -> Self {
        Self {
            token_exchange_service_uri: token_exchange_service_uri.into(),
            ..Default::default()
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), String> {
        if self.token_exchange_service_uri.is_empty() {
            return Err("token_exchange_service_uri is required".to_string());
        }

        let url = Url::parse(&self.token_exchange_service_uri).map_err(|e| {
            format!(
                "Invalid token_exchange_service_uri {:?}: {}",
                self.token_exchange_service_uri, e
            )
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(format!(
                "token_exchange_service_uri must be http(s), got scheme {:?}",
                url.scheme()
            ));
        }

        if self.subject_token_type.is_empty() {
            return Err("subject_token_type is required".to_string());
        }
        if self.requested_token_type.is_empty() {
            return Err("requested_token_type is required".to_string());
        }

        Ok(())
    }
}
