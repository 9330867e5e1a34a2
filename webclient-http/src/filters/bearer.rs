use crate::middleware::{Middleware, Next, order};
use crate::token::TokenProvider;
use crate::{HttpClientError, Response, Result};
use async_trait::async_trait;
use http::HeaderValue;
use http::header::AUTHORIZATION;
use reqwest::Request;
use std::fmt;
use std::sync::Arc;

/// Adds `Authorization: Bearer <token>` from a [`TokenProvider`].
///
/// The request passes through unchanged when no provider is configured,
/// when it already carries an `Authorization` header, or when the provider
/// has no usable token.
#[derive(Clone, Default)]
pub struct BearerTokenMiddleware {
    provider: Option<Arc<dyn TokenProvider>>,
}

impl BearerTokenMiddleware {
    /// Stage backed by `provider`.
    pub fn new(provider: Arc<dyn TokenProvider>) -> Self {
        Self {
            provider: Some(provider),
        }
    }

    /// Stage without a provider; never adds a header.
    pub fn disabled() -> Self {
        Self::default()
    }

    fn current_token(&self) -> Option<String> {
        let token = self.provider.as_ref()?.token()?;
        if token.trim().is_empty() {
            tracing::debug!("Token provider returned a blank token");
            return None;
        }
        Some(token)
    }
}

#[async_trait]
impl Middleware for BearerTokenMiddleware {
    fn order(&self) -> i32 {
        order::BEARER_TOKEN
    }

    async fn handle(&self, mut request: Request, next: Next<'_>) -> Result<Response> {
        if !request.headers().contains_key(AUTHORIZATION)
            && let Some(token) = self.current_token()
        {
            let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
                .map_err(|_| HttpClientError::Middleware("Bearer token is not a valid header value".to_string()))?;
            value.set_sensitive(true);
            request.headers_mut().insert(AUTHORIZATION, value);
        }
        next.run(request).await
    }
}

impl fmt::Debug for BearerTokenMiddleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BearerTokenMiddleware")
            .field("has_provider", &self.provider.is_some())
            .finish()
    }
}
