//! Credential adapters over any shared [`TokenSource`](crate::TokenSource).
//!
//! Both adapters are pass-throughs: caching and locking live in the source.

use tower::BoxError;

use crate::error::StsError;

pub mod bearer;
pub mod grpc;

pub use bearer::{BearerAuthLayer, BearerAuthService};
pub use grpc::{PerRpcAuthLayer, PerRpcAuthService, PerRpcCredentials};

/// Unwrap an [`StsError`] carried by a provider failure so callers can
/// downcast the boxed error to it.
pub(crate) fn into_box_error(err: anyhow::Error) -> BoxError {
    match err.downcast::<StsError>() {
        Ok(err) => Box::new(err),
        Err(err) => err.into(),
    }
}
