//! End-to-end token exchange tests against a mock STS.

use serde_json::json;
use std::convert::Infallible;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tower::{service_fn, BoxError, Layer, ServiceBuilder, ServiceExt};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use sts_token_source::{
    BearerAuthLayer, StaticTokenSource, StsConfig, StsError, StsTokenSource, Token,
};

fn sts_source(server: &MockServer) -> Arc<StsTokenSource> {
    let config = StsConfig {
        audience: "stsserver.example.com".to_string(),
        resource: "stsserver.example.com".to_string(),
        scope: "https://www.googleapis.com/auth/cloud-platform".to_string(),
        ..StsConfig::new(format!("{}/token", server.uri()))
    };
    let subject = Arc::new(StaticTokenSource::new(Token::bearer("iamtheeggman", None)));
    Arc::new(StsTokenSource::new(config, subject, reqwest::Client::new()).unwrap())
}

fn issued(access_token: &str, expires_in: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "access_token": access_token,
        "issued_token_type": "urn:ietf:params:oauth:token-type:access_token",
        "token_type": "Bearer",
        "expires_in": expires_in,
    }))
}

#[tokio::test]
async fn test_exchange_wire_format_and_caching() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Atoken-exchange",
        ))
        .and(body_string_contains("audience=stsserver.example.com"))
        .and(body_string_contains("resource=stsserver.example.com"))
        .and(body_string_contains(
            "scope=https%3A%2F%2Fwww.googleapis.com%2Fauth%2Fcloud-platform",
        ))
        .and(body_string_contains("subject_token=iamtheeggman"))
        .and(body_string_contains(
            "subject_token_type=urn%3Aietf%3Aparams%3Aoauth%3Atoken-type%3Aaccess_token",
        ))
        .and(body_string_contains(
            "requested_token_type=urn%3Aietf%3Aparams%3Aoauth%3Atoken-type%3Aaccess_token",
        ))
        .respond_with(issued("abc", 3600))
        .expect(1)
        .mount(&server)
        .await;

    let source = sts_source(&server);

    let first = source.token().await.unwrap();
    assert_eq!(first.access_token, "abc");
    assert_eq!(first.token_type, "Bearer");
    assert!(first.is_valid());

    let second = source.token().await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_token_without_lifetime_is_exchanged_every_call() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "abc",
            "issued_token_type": "urn:ietf:params:oauth:token-type:access_token",
            "token_type": "Bearer",
        })))
        .expect(2)
        .mount(&server)
        .await;

    let source = sts_source(&server);

    for _ in 0..2 {
        let token = source.token().await.unwrap();
        assert_eq!(token.access_token, "abc");
        assert!(token.expiry.is_some());
    }
    assert!(source.cached_token().await.is_none());
}

#[tokio::test]
async fn test_rejected_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"invalid_grant"}"#))
        .expect(2)
        .mount(&server)
        .await;

    let source = sts_source(&server);

    for _ in 0..2 {
        match source.token().await {
            Err(StsError::ExchangeRejected { status, body }) => {
                assert_eq!(status, 400);
                assert_eq!(body, r#"{"error":"invalid_grant"}"#);
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
    assert!(source.cached_token().await.is_none());
}

#[tokio::test]
async fn test_malformed_success_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let source = sts_source(&server);
    assert!(matches!(
        source.token().await,
        Err(StsError::Decode { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_sts_is_transport_error() {
    let server = MockServer::start().await;
    let source = sts_source(&server);
    drop(server);

    assert!(matches!(
        source.token().await,
        Err(StsError::Transport(_))
    ));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_callers_trigger_single_exchange() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(issued("abc", 3600).set_delay(Duration::from_millis(50)))
        .expect(1)
        .mount(&server)
        .await;

    let source = sts_source(&server);

    let mut handles = Vec::new();
    for _ in 0..8 {
        let source = Arc::clone(&source);
        handles.push(tokio::spawn(async move { source.token().await }));
    }
    for handle in handles {
        assert_eq!(handle.await.unwrap().unwrap().access_token, "abc");
    }
}

#[tokio::test]
async fn test_bearer_layer_over_reqwest() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(issued("abc", 3600))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/get"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(ResponseTemplate::new(200).set_body_string("hello"))
        .expect(2)
        .mount(&server)
        .await;

    let source = sts_source(&server);
    let client = reqwest::Client::new();

    let service = ServiceBuilder::new()
        .layer(BearerAuthLayer::new(source))
        .service(service_fn(move |request: http::Request<reqwest::Body>| {
            let client = client.clone();
            async move {
                let request = reqwest::Request::try_from(request)?;
                Ok::<_, BoxError>(client.execute(request).await?)
            }
        }));

    for _ in 0..2 {
        let request = http::Request::get(format!("{}/get", server.uri()))
            .body(reqwest::Body::from(""))
            .unwrap();
        let response = service.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), 200);
        assert_eq!(response.text().await.unwrap(), "hello");
    }
}

#[tokio::test]
async fn test_bearer_layer_does_not_send_on_exchange_failure() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("denied"))
        .mount(&server)
        .await;

    let source = sts_source(&server);
    let forwarded = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&forwarded);
    let service = BearerAuthLayer::new(source).layer(service_fn(move |_: http::Request<()>| {
        counter.fetch_add(1, Ordering::SeqCst);
        std::future::ready(Ok::<_, Infallible>(()))
    }));

    let request = http::Request::get("https://api.example.com/get")
        .body(())
        .unwrap();
    let err = service.oneshot(request).await.unwrap_err();
    assert_eq!(err.downcast_ref::<StsError>().unwrap().status(), Some(401));
    assert_eq!(forwarded.load(Ordering::SeqCst), 0);
}
