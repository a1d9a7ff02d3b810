//! Error types for the token exchange source.

use thiserror::Error;

/// Boxed error used for collaborator failures (subject token providers, transports).
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by [`StsTokenSource::token`](crate::StsTokenSource::token)
/// and the credential adapters.
#[derive(Debug, Error)]
pub enum StsError {
    /// The subject token provider failed; no exchange was attempted.
    #[error("failed to obtain subject token: {0}")]
    SubjectToken(#[source] BoxError),

    /// The HTTP round trip to the STS endpoint failed.
    #[error("token exchange request failed: {0}")]
    Transport(#[source] BoxError),

    /// The STS endpoint answered with a non-200 status.
    #[error("token exchange rejected with status {status}: {body}")]
    ExchangeRejected { status: u16, body: String },

    /// A 200 response body could not be turned into a token.
    #[error("failed to decode token exchange response: {message}")]
    Decode {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    /// The exchange request could not be form-encoded.
    #[error("failed to encode token exchange request: {0}")]
    Encode(#[from] serde_urlencoded::ser::Error),

    /// Required configuration is missing or invalid.
    #[error("invalid token source configuration: {0}")]
    Configuration(String),

    /// The issued token cannot be carried in a header or call metadata.
    #[error("token cannot be sent as a credential: {0}")]
    InvalidCredential(String),

    /// Credentials were requested for a channel that is not encrypted.
    #[error("per-RPC credentials require a secure transport, got scheme {0:?}")]
    InsecureTransport(String),
}

impl StsError {
    pub(crate) fn decode(message: impl Into<String>) -> Self {
        Self::Decode {
            message: message.into(),
            source: None,
        }
    }

    /// HTTP status carried by an [`StsError::ExchangeRejected`].
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::ExchangeRejected { status, .. } => Some(*status),
            _ => None,
        }
    }
}

impl From<serde_json::Error> for StsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Decode {
            message: e.to_string(),
            source: Some(e),
        }
    }
}
