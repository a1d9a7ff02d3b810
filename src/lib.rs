//! OAuth 2.0 Token Exchange (RFC 8693) credential source.
//!
//! [`StsTokenSource`] exchanges a subject token for an access token at a
//! Security Token Service, caches the issued token and refreshes it on
//! demand once it expires. The source is safe to share between tasks: at
//! most one exchange is in flight per instance.
//!
//! Two adapters consume a shared source:
//! - [`BearerAuthLayer`] sets `Authorization: Bearer ...` on outbound HTTP
//!   requests.
//! - [`PerRpcCredentials`] attaches the token as gRPC call metadata and
//!   refuses plaintext channels.

pub mod credentials;
pub mod error;
pub mod exchange;
pub mod subject;
pub mod token;

#[cfg(test)]
pub(crate) mod test_support;

pub use credentials::{BearerAuthLayer, PerRpcAuthLayer, PerRpcCredentials};
pub use error::{BoxError, StsError};
pub use exchange::{StsConfig, StsTokenSource, StsTokenSourceBuilder, ACCESS_TOKEN_TYPE};
pub use subject::{FileTokenSource, StaticTokenSource, TokenSource};
pub use token::Token;
