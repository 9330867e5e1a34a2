use crate::middleware::{Middleware, Next, order};
use crate::{HttpClientError, Response, Result};
use async_trait::async_trait;
use http::HeaderValue;
use reqwest::Request;

/// Correlation id header, sent as `X-Correlation-Id`. Lowercase so it can
/// key a `HeaderMap` directly.
pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

/// Stamps a fresh UUID v4 correlation id on requests that carry none.
///
/// A caller-supplied id is left untouched.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationIdMiddleware;

impl CorrelationIdMiddleware {
    /// Create the stage.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Middleware for CorrelationIdMiddleware {
    fn order(&self) -> i32 {
        order::CORRELATION_ID
    }

    async fn handle(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
        if !request.headers().contains_key(CORRELATION_ID_HEADER) {
            let id = uuid::Uuid::new_v4().to_string();
            let value = HeaderValue::from_str(&id)
                .map_err(|e| HttpClientError::Middleware(e.to_string()))?;
            request.headers_mut().insert(CORRELATION_ID_HEADER, value);
        }
        next.run(request).await
    }
}
