//! Per-call gRPC credentials.
//!
//! Every gRPC call, unary or streaming, is a single HTTP/2 request, so the
//! credentials are attached by a tower layer around the channel rather than
//! by a synchronous tonic interceptor.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tonic::metadata::{AsciiMetadataValue, MetadataMap};
use tonic::transport::{Channel, Endpoint};
use tonic::Status;
use tower::{BoxError, Layer, Service};
use tracing::debug;

use super::into_box_error;
use crate::error::StsError;
use crate::subject::TokenSource;

/// Per-RPC credentials backed by a shared [`TokenSource`].
#[derive(Clone)]
pub struct PerRpcCredentials {
    source: Arc<dyn TokenSource>,
}

impl PerRpcCredentials {
    pub fn new(source: Arc<dyn TokenSource>) -> Self {
        Self { source }
    }

    /// Metadata to attach to the next call.
    pub async fn request_metadata(&self) -> Result<MetadataMap, BoxError> {
        let token = self.source.token().await.map_err(into_box_error)?;

        let mut value = AsciiMetadataValue::try_from(token.authorization_value())
            .map_err(|e| StsError::InvalidCredential(e.to_string()))?;
        value.set_sensitive(true);

        let mut metadata = MetadataMap::new();
        metadata.insert("authorization", value);
        Ok(metadata)
    }

    /// Bearer tokens must only travel over an encrypted channel.
    pub fn require_transport_security(&self) -> bool {
        true
    }

    /// Build a layer for a channel dialed through `endpoint`.
    ///
    /// Fails when the endpoint is not `https` and transport security is
    /// required.
    pub fn layer(&self, endpoint: &Endpoint) -> Result<PerRpcAuthLayer, StsError> {
        if self.require_transport_security() {
            let scheme = endpoint.uri().scheme_str().unwrap_or_default();
            if scheme != "https" {
                return Err(StsError::InsecureTransport(scheme.to_string()));
            }
        }

        Ok(PerRpcAuthLayer {
            credentials: self.clone(),
        })
    }

    /// Lazily connect `endpoint` and attach these credentials to every call
    /// on the resulting channel.
    pub fn channel(&self, endpoint: Endpoint) -> Result<PerRpcAuthService<Channel>, StsError> {
        let layer = self.layer(&endpoint)?;
        debug!(uri = %endpoint.uri(), "Opening channel with per-RPC credentials");
        Ok(layer.layer(endpoint.connect_lazy()))
    }
}

impl fmt::Debug for PerRpcCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PerRpcCredentials")
            .field("require_transport_security", &self.require_transport_security())
            .finish_non_exhaustive()
    }
}

/// Tower layer attaching [`PerRpcCredentials`] to every call on a channel.
#[derive(Debug, Clone)]
pub struct PerRpcAuthLayer {
    credentials: PerRpcCredentials,
}

impl<S> Layer<S> for PerRpcAuthLayer {
    type Service = PerRpcAuthService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        PerRpcAuthService {
            inner,
            credentials: self.credentials.clone(),
        }
    }
}

/// Service produced by [`PerRpcAuthLayer`].
///
/// Failures are reported as `UNAUTHENTICATED` statuses and the call is not
/// forwarded.
#[derive(Debug, Clone)]
pub struct PerRpcAuthService<S> {
    inner: S,
    credentials: PerRpcCredentials,
}

impl<S, ReqBody> Service<http::Request<ReqBody>> for PerRpcAuthService<S>
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
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);
        let credentials = self.credentials.clone();

        Box::pin(async move {
            // Channels send path-only URIs; the endpoint scheme was checked
            // when the layer was built.
            if credentials.require_transport_security() {
                if let Some(scheme) = request.uri().scheme_str() {
                    if scheme != "https" {
                        return Err(Status::unauthenticated(format!(
                            "refusing to send credentials over {} transport",
                            scheme
                        ))
                        .into());
                    }
                }
            }

            let metadata = credentials
                .request_metadata()
                .await
                .map_err(|e| Status::unauthenticated(e.to_string()))?;

            debug!(path = %request.uri().path(), "Attaching per-RPC credentials");
            request.headers_mut().extend(metadata.into_headers());

            inner.call(request).await.map_err(Into::into)
        })
    }
}
