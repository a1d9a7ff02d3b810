//! Token Exchange (RFC 8693) client.
//!
//! Exchanges a subject token for an access token at a remote STS and caches
//! the issued token until it expires.

pub mod codec;
pub mod config;
pub mod source;
pub mod transport;

pub use codec::{
    decode_response, encode_request, TokenExchangeRequest, TokenExchangeResponse,
    GRANT_TYPE_TOKEN_EXCHANGE,
};
pub use config::{StsConfig, ACCESS_TOKEN_TYPE};
pub use source::{StsTokenSource, StsTokenSourceBuilder};
pub use transport::{ExchangeTransport, RawResponse, ReqwestTransport};
