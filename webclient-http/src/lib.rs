//! # webclient-http
//!
//! An outbound HTTP client for calling other services, with retry,
//! per-call and global timeouts, mutual TLS, bearer tokens and correlation
//! ids.
//!
//! ## Features
//!
//! - **Request specifications**: URL, method, headers, body, expected
//!   response type and per-call overrides in one immutable value
//! - **Retry with Backoff**: exponential backoff on server errors, `429` and
//!   transport failures; never on other client errors
//! - **Timeouts**: one total timeout per call that covers every retry
//! - **Middleware**: rank-ordered stages for correlation ids, bearer tokens
//!   and request logging, plus your own
//! - **Mutual TLS**: PKCS12 or PEM key and trust stores, with a fixed client
//!   key alias
//! - **Async and blocking**: [`WebServiceClient`] for async code,
//!   [`RestServiceClient`] for threads
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use webclient_http::{HttpClientConfig, RequestSpec, ResponseType, WebServiceClient};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = WebServiceClient::new(HttpClientConfig::default())?;
//!
//!     let spec = RequestSpec::builder()
//!         .url("https://api.example.com/users/42")
//!         .response_type(ResponseType::<serde_json::Value>::json())
//!         .build()?;
//!
//!     let user = client.execute(spec).await?;
//!     println!("User: {}", user);
//!     Ok(())
//! }
//! ```
//!
//! ## With Middleware and Per-Call Overrides
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use webclient_http::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let tokens: Arc<dyn TokenProvider> = Arc::new(|| std::env::var("API_TOKEN").ok());
//!     let client = WebServiceClient::new(HttpClientConfig::default())?;
//!
//!     let spec = RequestSpec::builder()
//!         .method(Method::POST)
//!         .url("https://api.example.com/orders")
//!         .json(&serde_json::json!({"item": "widget", "quantity": 5}))
//!         .response_type(ResponseType::<serde_json::Value>::json())
//!         .timeout_ms(5_000)
//!         .max_retries(2)
//!         .middleware(Arc::new(CorrelationIdMiddleware::new()))
//!         .middleware(Arc::new(BearerTokenMiddleware::new(tokens)))
//!         .middleware(Arc::new(RequestLoggingMiddleware::new()))
//!         .build()?;
//!
//!     let order = client.execute(spec).await?;
//!     println!("Created: {}", order);
//!     Ok(())
//! }
//! ```

mod blocking;
mod client;
mod config;
mod error;
mod executor;
pub mod filters;
pub mod interrupt;
pub mod middleware;
pub mod properties;
mod request;
mod response;
pub mod retry;
pub mod tls;
mod token;
mod transport;

#[cfg(test)]
mod test_support;

pub use blocking::{RestServiceClient, RestServiceClientBuilder};
pub use client::{WebServiceClient, WebServiceClientBuilder};
pub use config::{
    HttpClientConfig, HttpClientConfigBuilder, PoolConfig, ResponseConfig, RetryConfig,
    STORE_TYPE_PEM, STORE_TYPE_PKCS12, SslConfig, TLS_PROTOCOLS, TimeoutConfig,
};
pub use error::{HttpClientError, Result, TransportErrorKind};
pub use filters::{
    BearerTokenMiddleware, CORRELATION_ID_HEADER, CorrelationIdMiddleware, RequestLoggingMiddleware,
};
pub use middleware::{Middleware, MiddlewareChain, Next};
pub use request::{RequestBody, RequestSpec, RequestSpecBuilder, ResponseType, media_type};
pub use response::Response;
pub use retry::{RetryPolicy, RetryStrategy};
pub use tls::{TlsContext, TlsContextBuilder};
pub use token::{CachedTokenProvider, IssuedToken, TokenProvider};
pub use transport::{ReqwestTransport, Transport};

// Re-export common types
pub use bytes::Bytes;
pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
pub use reqwest::Request;
pub use url::Url;

/// Prelude for common imports.
///
/// ```
/// use webclient_http::prelude::*;
/// ```
pub mod prelude {
    pub use crate::blocking::RestServiceClient;
    pub use crate::client::WebServiceClient;
    pub use crate::config::{HttpClientConfig, HttpClientConfigBuilder};
    pub use crate::error::{HttpClientError, Result};
    pub use crate::filters::{
        BearerTokenMiddleware, CorrelationIdMiddleware, RequestLoggingMiddleware,
    };
    pub use crate::middleware::{Middleware, MiddlewareChain, Next};
    pub use crate::request::{RequestBody, RequestSpec, ResponseType, media_type};
    pub use crate::response::Response;
    pub use crate::token::{CachedTokenProvider, TokenProvider};
    pub use http::{HeaderMap, HeaderValue, Method, StatusCode, header};
    pub use reqwest::Request;
}
