//! Fakes shared by unit tests.

use async_trait::async_trait;
use bytes::Bytes;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::error::StsError;
use crate::exchange::{ExchangeTransport, RawResponse, StsConfig, StsTokenSource};
use crate::subject::StaticTokenSource;
use crate::token::Token;

/// Answers every exchange with the same reply.
pub(crate) struct FixedTransport {
    status: u16,
    body: &'static str,
    calls: AtomicUsize,
}

impl FixedTransport {
    pub(crate) fn new(status: u16, body: &'static str) -> Self {
        Self {
            status,
            body,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ExchangeTransport for FixedTransport {
    async fn send(&self, _endpoint: &str, _form_body: String) -> Result<RawResponse, StsError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(RawResponse {
            status: self.status,
            body: Bytes::from_static(self.body.as_bytes()),
        })
    }
}

/// A source backed by `transport` and a static subject token.
pub(crate) fn source_with(transport: Arc<FixedTransport>) -> Arc<StsTokenSource> {
    let source = StsTokenSource::builder(StsConfig::new("https://sts.example.com/token"))
        .subject_token_source(Arc::new(StaticTokenSource::new(Token::bearer(
            "iamtheeggman",
            None,
        ))))
        .transport(transport)
        .build()
        .unwrap();
    Arc::new(source)
}
