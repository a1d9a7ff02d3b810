//! STS token exchange client
//!
//! Exchanges a subject token at an RFC 8693 Security Token Service, calls an
//! HTTP endpoint with the issued token as a bearer credential and, when a gRPC
//! address is given, makes one unary call with it as per-RPC credentials.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use http::uri::PathAndQuery;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::{ClientTlsConfig, Endpoint};
use tonic_prost::ProstCodec;
use tower::{service_fn, BoxError, ServiceBuilder, ServiceExt};
use tracing::{info, warn};

use sts_token_source::{
    BearerAuthLayer, FileTokenSource, PerRpcCredentials, StaticTokenSource, StsConfig,
    StsTokenSource, Token, TokenSource, ACCESS_TOKEN_TYPE,
};

const SAY_HELLO: &str = "/echo.EchoServer/SayHello";

#[derive(Clone, PartialEq, prost::Message)]
struct EchoRequest {
    #[prost(string, tag = "1")]
    name: String,
}

#[derive(Clone, PartialEq, prost::Message)]
struct EchoReply {
    #[prost(string, tag = "1")]
    message: String,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "sts-exchange")]
#[command(about = "Exchange a token at an RFC 8693 STS and call an HTTP endpoint with it")]
struct Args {
    /// STS token endpoint
    #[arg(long, env = "STS_ADDRESS")]
    sts_address: String,

    /// Audience to request from the STS
    #[arg(long, default_value = "", env = "STS_AUDIENCE")]
    sts_audience: String,

    /// Resource to request from the STS (defaults to the audience)
    #[arg(long, env = "STS_RESOURCE")]
    resource: Option<String>,

    /// Scope to request from the STS
    #[arg(
        long,
        default_value = "https://www.googleapis.com/auth/cloud-platform",
        env = "STS_SCOPE"
    )]
    scope: String,

    /// Subject token to exchange
    #[arg(long, env = "SUBJECT_TOKEN", conflicts_with = "subject_token_file")]
    subject_token: Option<String>,

    /// File holding the subject token, re-read on every exchange
    #[arg(long, env = "SUBJECT_TOKEN_FILE")]
    subject_token_file: Option<PathBuf>,

    /// Subject token type URN
    #[arg(long, default_value = ACCESS_TOKEN_TYPE, env = "SUBJECT_TOKEN_TYPE")]
    subject_token_type: String,

    /// Requested token type URN
    #[arg(long, default_value = ACCESS_TOKEN_TYPE, env = "REQUESTED_TOKEN_TYPE")]
    requested_token_type: String,

    /// HTTP endpoint to call with the issued token
    #[arg(long, default_value = "https://httpbin.org/get", env = "HTTP_ADDRESS")]
    http_address: String,

    /// gRPC echo server (host:port or https URI) to call with per-RPC credentials
    #[arg(long, env = "GRPC_ADDRESS")]
    grpc_address: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, env = "STS_VERBOSE")]
    verbose: bool,
}

impl Args {
    fn sts_config(&self) -> StsConfig {
        StsConfig {
            token_exchange_service_uri: self.sts_address.clone(),
            audience: self.sts_audience.clone(),
            resource: self
                .resource
                .clone()
                .unwrap_or_else(|| self.sts_audience.clone()),
            scope: self.scope.clone(),
            subject_token_type: self.subject_token_type.clone(),
            requested_token_type: self.requested_token_type.clone(),
            expiry_skew_secs: 0,
        }
    }

    fn subject_token_source(&self) -> Result<Arc<dyn TokenSource>> {
        if let Some(path) = &self.subject_token_file {
            return Ok(Arc::new(FileTokenSource::new(path.clone())));
        }
        let token = self
            .subject_token
            .as_ref()
            .ok_or_else(|| anyhow!("One of --subject-token or --subject-token-file is required"))?;
        Ok(Arc::new(StaticTokenSource::new(Token::bearer(
            token.clone(),
            None,
        ))))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize tracing
    let log_level = if args.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(format!(
            "{}={},sts_token_source={}",
            env!("CARGO_CRATE_NAME"),
            log_level,
            log_level
        ))
        .json()
        .init();

    let config = args.sts_config();
    info!(
        sts = %config.token_exchange_service_uri,
        audience = %config.audience,
        scope = %config.scope,
        "Starting token exchange"
    );

    let http_client = reqwest::Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .context("Failed to create HTTP client")?;

    let source = Arc::new(StsTokenSource::new(
        config,
        args.subject_token_source()?,
        http_client.clone(),
    )?);

    let token = source.token().await.context("Token exchange failed")?;
    info!(expiry = ?token.expiry, "New token issued");

    let service = ServiceBuilder::new()
        .layer(BearerAuthLayer::new(source.clone() as Arc<dyn TokenSource>))
        .service(service_fn(move |request: http::Request<reqwest::Body>| {
            let client = http_client.clone();
            async move {
                let request = reqwest::Request::try_from(request)?;
                Ok::<_, BoxError>(client.execute(request).await?)
            }
        }));

    let request = http::Request::get(args.http_address.as_str())
        .body(reqwest::Body::from(""))
        .context("Invalid HTTP address")?;

    let response = service
        .oneshot(request)
        .await
        .map_err(|e| anyhow!(e))
        .context("Request to HTTP endpoint failed")?;

    let status = response.status();
    if !status.is_success() {
        warn!(status = %status, "HTTP endpoint returned an error");
        return Err(anyhow!("Error connecting to server: {}", status));
    }

    let body = response
        .text()
        .await
        .context("Failed to read response body")?;
    info!(status = %status, body = %body, "HTTP response received");

    if let Some(address) = &args.grpc_address {
        say_hello(source, address).await?;
    }

    Ok(())
}

/// TLS endpoint for `address`; bare `host:port` values are dialed over https.
fn grpc_endpoint(address: &str) -> Result<Endpoint> {
    let uri = if address.contains("://") {
        address.to_string()
    } else {
        format!("https://{}", address)
    };

    Endpoint::from_shared(uri)
        .context("Invalid gRPC address")?
        .tls_config(ClientTlsConfig::new().with_webpki_roots())
        .context("Failed to configure TLS")
}

async fn say_hello(source: Arc<StsTokenSource>, address: &str) -> Result<()> {
    let credentials = PerRpcCredentials::new(source);
    let channel = credentials.channel(grpc_endpoint(address)?)?;

    let mut client = tonic::client::Grpc::new(channel);
    client
        .ready()
        .await
        .map_err(|e| anyhow!(e))
        .context("gRPC channel not ready")?;

    let request = tonic::Request::new(EchoRequest {
        name: "unary RPC msg".to_string(),
    });
    let response = client
        .unary(
            request,
            PathAndQuery::from_static(SAY_HELLO),
            ProstCodec::<EchoRequest, EchoReply>::default(),
        )
        .await
        .context("gRPC call failed")?;

    info!(message = %response.get_ref().message, "RPC response received");
    Ok(())
}
