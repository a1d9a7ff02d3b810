//! Bearer token injection for outbound HTTP requests.

use http::header::{HeaderValue, AUTHORIZATION};
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tower::{BoxError, Layer, Service};

use super::into_box_error;
use crate::error::StsError;
use crate::subject::TokenSource;

/// Tower layer that authorizes every request with a token from a
/// [`TokenSource`], usually a shared [`StsTokenSource`](crate::StsTokenSource).
#[derive(Clone)]
pub struct BearerAuthLayer {
    source: Arc<dyn TokenSource>,
}

impl BearerAuthLayer {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self { source }
    }
}

impl fmt::Debug for BearerAuthLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuthLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for BearerAuthLayer {
    type Service = BearerAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        BearerAuthService {
            inner,
            source: Arc::clone(&self.source),
        }
    }
}

/// Service produced by [`BearerAuthLayer`].
///
/// Sets `Authorization: Bearer <token>` before forwarding. When no token can
/// be obtained the request is dropped and the provider's error is returned
/// instead; an [`StsError`] stays downcastable.
#[derive(Clone)]
pub struct BearerAuthService<S> {
    inner: S,
    source: Arc<dyn TokenSource>,
}

impl<S: fmt::Debug> fmt::Debug for BearerAuthService<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerAuthService")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for BearerAuthService<S>
where
    S: Service<http::Request<ReqBody>> + Clone + Send + 'static,
    S::Future: Send,
    S::Error: Into<BoxError>,
    ReqBody: Send + 'static,
{
    type Response = S::Response;
    type Error = BoxError;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx).map_err(Into::into)
    }

    fn call(&mut self, mut request: http::Request<ReqBody>) -> Self::Future {
        // Take the service that was driven to readiness, leave a fresh clone behind.
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let source = Arc::clone(&self.source);

        Box::pin(async move {
            let token = source.token().await.map_err(into_box_error)?;

            let mut value = HeaderValue::from_str(&token.authorization_value())
                .map_err(|e| StsError::InvalidCredential(e.to_string()))?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);

            inner.call(request).await.map_err(Into::into)
        })
    }
}
