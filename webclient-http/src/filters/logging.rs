use crate::middleware::{Middleware, Next, order};
use crate::{Response, Result};
use async_trait::async_trait;
use reqwest::Request;
use std::time::Instant;
use tracing::Level;

/// Logs each exchange at DEBUG:
///
/// ```text
/// >>> GET https://api.example.com/items
/// <<< GET https://api.example.com/items — 200 (12ms)
/// <<< GET https://api.example.com/items — FAILED (5000ms): connection refused
/// ```
///
/// Costs nothing beyond a level check when DEBUG is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct RequestLoggingMiddleware;

impl RequestLoggingMiddleware {
    /// Create the stage.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for RequestLoggingMiddleware {
    fn order(&self) -> i32 {
        order::REQUEST_LOGGING
    }

    async fn handle(&self, request: Request, next: Next<'_>) -> Result<Response> {
        if !tracing::enabled!(Level::DEBUG) {
            return next.run(request).await;
        }

        let method = request.method().clone();
        let url = request.url().clone();
        tracing::debug!(%method, %url, ">>> {} {}", method, url);

        let start = Instant::now();
        let result = next.run(request).await;
        let elapsed_ms = start.elapsed().as_millis() as u64;

        match &result {
            Ok(response) => {
                let status = response.status().as_u16();
                tracing::debug!(
                    %method,
                    %url,
                    status,
                    elapsed_ms,
                    "<<< {} {} — {} ({}ms)",
                    method,
                    url,
                    status,
                    elapsed_ms
                );
            }
            Err(e) => {
                tracing::debug!(
                    %method,
                    %url,
                    elapsed_ms,
                    error = %e,
                    "<<< {} {} — FAILED ({}ms): {}",
                    method,
                    url,
                    elapsed_ms,
                    e
                );
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::middleware::MiddlewareChain;
    use crate::test_support::{CapturedLogs, EchoTransport, ScriptedTransport};
    use crate::{HttpClientError, TransportErrorKind};
    use http::Method;
    use std::sync::Arc;

    fn request() -> Request {
        Request::new(Method::GET, url::Url::parse("https://example.com/items").unwrap())
    }

    #[tokio::test]
    async fn test_logs_both_directions_at_debug() {
        let chain = MiddlewareChain::new(Arc::new(EchoTransport::default()))
            .with_middleware(Arc::new(RequestLoggingMiddleware::new()));
        let (logs, _guard) = CapturedLogs::install(Level::DEBUG);

        let response = chain.execute(request()).await.unwrap();
        assert_eq!(response.text().unwrap(), "ok");

        let output = logs.text();
        assert!(output.contains(">>> GET https://example.com/items"));
        assert!(output.contains("<<< GET https://example.com/items — 200 ("));
    }

    #[tokio::test]
    async fn test_silent_above_debug() {
        let chain = MiddlewareChain::new(Arc::new(EchoTransport::default()))
            .with_middleware(Arc::new(RequestLoggingMiddleware::new()));
        let (logs, _guard) = CapturedLogs::install(Level::INFO);

        chain.execute(request()).await.unwrap();

        assert!(logs.text().is_empty());
    }

    #[tokio::test]
    async fn test_logs_failure_and_passes_error_through() {
        let transport = ScriptedTransport::new(vec![Err(HttpClientError::transport(
            TransportErrorKind::Connect,
            "connection refused",
        ))]);
        let chain = MiddlewareChain::new(Arc::new(transport))
            .with_middleware(Arc::new(RequestLoggingMiddleware));
        let (logs, _guard) = CapturedLogs::install(Level::DEBUG);

        let err = chain.execute(request()).await.unwrap_err();
        assert!(err.is_transport());

        let output = logs.text();
        let line = output
            .lines()
            .find(|line| line.contains("<<< GET https://example.com/items — FAILED ("))
            .unwrap_or_else(|| panic!("no failure line in:\n{output}"));
        assert!(line.contains("ms): "));
        assert!(line.contains("connection refused"));
        assert!(!output.contains("— 200 ("));
    }
}
