//! Integration tests for common webclient workflows.
//!
//! These tests verify that the most common use cases work correctly.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use webclient::prelude::*;
use webclient::{CORRELATION_ID_HEADER, IssuedToken, properties};
use wiremock::matchers::{header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// Configuration Tests
// =============================================================================

#[test]
fn test_properties_bind_onto_defaults() {
    let config = properties::from_properties(properties::parse_properties(
        "# client settings\n\
         webclient.http.pool.max-connections=50\n\
         webclient.http.retry.maxRetries: 1\n\
         webclient.http.timeout.timeoutMs=2500\n\
         other.setting=ignored\n",
    ))
    .unwrap();

    assert_eq!(config.pool.max_connections, 50);
    assert_eq!(config.pool.max_connections_per_route, 50);
    assert_eq!(config.retry.max_retries, 1);
    assert_eq!(config.timeout.timeout(), Duration::from_millis(2500));
    assert!(!config.ssl.enabled);
}

#[test]
fn test_invalid_configuration_is_rejected() {
    let err = properties::from_properties([("webclient.http.pool.maxConnections", "0")]).unwrap_err();
    assert!(matches!(err, HttpClientError::Config(_)));

    let err = WebServiceClient::new(HttpClientConfig::builder().max_connections(0).build())
        .unwrap_err();
    assert!(matches!(err, HttpClientError::Config(_)));
}

#[test]
fn test_spec_without_response_type_is_rejected() {
    let err = RequestSpec::<String>::builder()
        .url("https://api.example.com")
        .build()
        .unwrap_err();
    assert!(matches!(err, HttpClientError::Config(_)));
}

// =============================================================================
// Client Workflows
// =============================================================================

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Order {
    item: String,
    quantity: u32,
}

#[tokio::test]
async fn test_json_round_trip_with_shared_middleware() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/orders"))
        .and(header("content-type", "application/json"))
        .and(header_exists(CORRELATION_ID_HEADER))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "item": "widget",
            "quantity": 5
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = WebServiceClient::builder(HttpClientConfig::default())
        .middleware(Arc::new(CorrelationIdMiddleware::new()))
        .middleware(Arc::new(RequestLoggingMiddleware::new()))
        .build()
        .unwrap();

    let order = Order {
        item: "widget".to_string(),
        quantity: 5,
    };
    let spec = RequestSpec::builder()
        .method(Method::POST)
        .url(format!("{}/orders", server.uri()))
        .json(&order)
        .response_type(ResponseType::<Order>::json())
        .build()
        .unwrap();

    assert_eq!(client.execute(spec).await.unwrap(), order);
}

#[tokio::test]
async fn test_cached_token_is_reused_across_calls() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(header("authorization", "Bearer token-1"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(3)
        .mount(&server)
        .await;

    let issued = Arc::new(AtomicUsize::new(0));
    let counter = issued.clone();
    let tokens: Arc<dyn TokenProvider> = Arc::new(CachedTokenProvider::new(move || {
        let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(IssuedToken::new(format!("token-{}", n), Duration::from_secs(600)))
    }));

    let client = WebServiceClient::builder(HttpClientConfig::default())
        .middleware(Arc::new(BearerTokenMiddleware::new(tokens)))
        .build()
        .unwrap();

    for _ in 0..3 {
        let spec = RequestSpec::builder()
            .url(server.uri())
            .response_type(ResponseType::text())
            .build()
            .unwrap();
        assert_eq!(client.execute(spec).await.unwrap(), "ok");
    }

    assert_eq!(issued.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_clients_share_one_pool_across_tasks() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(16)
        .mount(&server)
        .await;

    let client = WebServiceClient::new(
        HttpClientConfig::builder()
            .max_connections(4)
            .max_connections_per_route(2)
            .build(),
    )
    .unwrap();

    let mut tasks = Vec::new();
    for _ in 0..16 {
        let client = client.clone();
        let url = server.uri();
        tasks.push(tokio::spawn(async move {
            let spec = RequestSpec::builder()
                .url(url)
                .response_type(ResponseType::text())
                .build()
                .unwrap();
            client.execute(spec).await
        }));
    }

    for task in tasks {
        assert_eq!(task.await.unwrap().unwrap(), "ok");
    }
}

#[test]
fn test_blocking_client_from_plain_threads() {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let server = rt.block_on(async {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
            .mount(&server)
            .await;
        server
    });

    let client = RestServiceClient::default_client().unwrap();
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let client = client.clone();
            let url = server.uri();
            std::thread::spawn(move || {
                let spec = RequestSpec::builder()
                    .url(url)
                    .response_type(ResponseType::text())
                    .build()
                    .unwrap();
                client.execute(spec)
            })
        })
        .collect();

    for worker in workers {
        assert_eq!(worker.join().unwrap().unwrap(), "ok");
    }
}
