//! Issued and subject token records.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Token type reported for every token issued through an exchange.
pub const BEARER: &str = "Bearer";

/// An access token together with its type and expiry.
///
/// A token is valid when its access token is non-empty and its expiry is
/// strictly in the future. A token without an expiry never expires.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    /// The raw access token.
    pub access_token: String,
    /// Token type, e.g. "Bearer".
    pub token_type: String,
    /// Expiry instant, if one was declared.
    #[serde(default)]
    pub expiry: Option<DateTime<Utc>>,
}

impl Token {
    /// Create a bearer token.
    pub fn bearer(access_token: impl Into<String>, expiry: Option<DateTime<Utc>>) -> Self {
        Self {
            access_token: access_token.into(),
            token_type: BEARER.to_string(),
            expiry,
        }
    }

    /// Whether the token is usable right now.
    pub fn is_valid(&self) -> bool {
        self.is_valid_at(Utc::now())
    }

    /// Whether the token is usable at `now`.
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        if self.access_token.is_empty() {
            return false;
        }
        match self.expiry {
            Some(expiry) => expiry > now,
            None => true,
        }
    }

    /// Remaining lifetime at `now`, if an expiry is known.
    pub fn expires_in(&self, now: DateTime<Utc>) -> Option<TimeDelta> {
        self.expiry.map(|expiry| expiry - now)
    }

    /// Value for an `Authorization` header.
    pub fn authorization_value(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("token_type", &self.token_type)
            .field("expiry", &self.expiry)
            .finish()
    }
}
