//! Subject token providers.
//!
//! Anything that can hand out a currently valid token implements
//! [`TokenSource`]. The exchange source only ever asks for the access token
//! string; how a provider obtains or refreshes it is its own business.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

use crate::token::Token;

/// A provider of tokens.
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return a currently valid token.
    async fn token(&self) -> Result<Token>;
}

/// Always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticTokenSource {
    token: Token,
}

impl StaticTokenSource {
    pub fn new(token: Token) -> Self {
        Self { token }
    }
}

#[async_trait]
impl TokenSource for StaticTokenSource {
    async fn token(&self) -> Result<Token> {
        Ok(self.token.clone())
    }
}

/// Reads the token from a file on every call.
///
/// The file holds the raw token; surrounding whitespace is ignored. Tools
/// that rotate the file in place are picked up on the next exchange.
#[derive(Debug, Clone)]
pub struct FileTokenSource {
    path: PathBuf,
    token_type: String,
}

impl FileTokenSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            token_type: crate::token::BEARER.to_string(),
        }
    }

    /// Override the token type reported for the file contents.
    pub fn with_token_type(mut self, token_type: impl Into<String>) -> Self {
        self.token_type = token_type.into();
        self
    }
}

#[async_trait]
impl TokenSource for FileTokenSource {
    async fn token(&self) -> Result<Token> {
        let contents = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read subject token file: {:?}", self.path))?;

        let access_token = contents.trim();
        if access_token.is_empty() {
            return Err(anyhow!("Subject token file is empty: {:?}", self.path));
        }

        debug!(path = ?self.path, "Loaded subject token from file");

        Ok(Token {
            access_token: access_token.to_string(),
            token_type: self.token_type.clone(),
            expiry: None,
        })
    }
}
