//! HTTP client benchmarks for webclient

use async_trait::async_trait;
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use webclient::retry::is_retriable;
use webclient::{
    CorrelationIdMiddleware, HttpClientConfig, HttpClientError, MiddlewareChain, Request,
    RequestLoggingMiddleware, RequestSpec, Response, ResponseType, RetryConfig, RetryPolicy,
    StatusCode, Transport,
};

struct StaticTransport;

#[async_trait]
impl Transport for StaticTransport {
    async fn send(&self, request: Request) -> webclient::Result<Response> {
        Ok(Response::new(
            StatusCode::OK,
            request.headers().clone(),
            "ok",
            request.url().clone(),
        ))
    }
}

fn retry_policy_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("retry_policy");
    let global = RetryConfig::default();

    group.bench_function("resolve_defaults", |b| {
        b.iter(|| black_box(RetryPolicy::resolve(None, None, black_box(&global))));
    });

    group.bench_function("resolve_overrides", |b| {
        b.iter(|| black_box(RetryPolicy::resolve(Some(5), Some(250), black_box(&global))));
    });

    let policy = RetryPolicy::new(10, Duration::from_millis(100));
    group.bench_function("backoff", |b| {
        b.iter(|| black_box(policy.backoff(black_box(7))));
    });

    group.finish();
}

fn classifier_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("retry_classifier");

    let unavailable = HttpClientError::from_status(
        StatusCode::SERVICE_UNAVAILABLE,
        Default::default(),
        Default::default(),
    );
    let not_found =
        HttpClientError::from_status(StatusCode::NOT_FOUND, Default::default(), Default::default());
    let timeout = HttpClientError::Timeout(Duration::from_secs(1));

    group.bench_function("server_error", |b| {
        b.iter(|| black_box(is_retriable(black_box(&unavailable))));
    });

    group.bench_function("client_error", |b| {
        b.iter(|| black_box(is_retriable(black_box(&not_found))));
    });

    group.bench_function("timeout", |b| {
        b.iter(|| black_box(is_retriable(black_box(&timeout))));
    });

    group.finish();
}

fn request_spec_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("request_spec");

    group.bench_function("build_get", |b| {
        b.iter(|| {
            let spec = RequestSpec::builder()
                .url(black_box("https://api.example.com/users/42"))
                .header("X-Tenant", "acme")
                .response_type(ResponseType::text())
                .build();
            black_box(spec)
        });
    });

    group.bench_function("build_post_json", |b| {
        b.iter(|| {
            let spec = RequestSpec::builder()
                .method(webclient::Method::POST)
                .url(black_box("https://api.example.com/orders"))
                .json(&serde_json::json!({"item": "widget", "quantity": 5}))
                .response_type(ResponseType::<serde_json::Value>::json())
                .timeout_ms(5_000)
                .max_retries(2)
                .build();
            black_box(spec)
        });
    });

    group.finish();
}

fn config_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("http_client_config");

    group.bench_function("default", |b| {
        b.iter(|| black_box(HttpClientConfig::default()));
    });

    group.bench_function("builder", |b| {
        b.iter(|| {
            let config = HttpClientConfig::builder()
                .max_connections(200)
                .max_connections_per_route(50)
                .timeout(Duration::from_secs(10))
                .max_retries(5)
                .retry_interval(Duration::from_millis(250))
                .build();
            black_box(config)
        });
    });

    let properties = [
        ("webclient.http.pool.maxConnections", "200"),
        ("webclient.http.timeout.timeoutMs", "10000"),
        ("webclient.http.retry.maxRetries", "5"),
    ];
    group.bench_function("from_properties", |b| {
        b.iter(|| black_box(webclient::properties::from_properties(properties)));
    });

    group.finish();
}

fn middleware_chain_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("middleware_chain");
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let url = webclient::Url::parse("https://api.example.com/users/42").unwrap();

    let bare = MiddlewareChain::new(Arc::new(StaticTransport));
    group.bench_function("no_stages", |b| {
        b.to_async(&runtime).iter(|| async {
            let request = Request::new(webclient::Method::GET, url.clone());
            black_box(bare.execute(request).await)
        });
    });

    let stamped = MiddlewareChain::new(Arc::new(StaticTransport))
        .with_middleware(Arc::new(CorrelationIdMiddleware::new()))
        .with_middleware(Arc::new(RequestLoggingMiddleware::new()));
    group.bench_function("correlation_and_logging", |b| {
        b.to_async(&runtime).iter(|| async {
            let request = Request::new(webclient::Method::GET, url.clone());
            black_box(stamped.execute(request).await)
        });
    });

    group.finish();
}

criterion_group!(
    benches,
    retry_policy_benchmark,
    classifier_benchmark,
    request_spec_benchmark,
    config_benchmark,
    middleware_chain_benchmark,
);

criterion_main!(benches);
