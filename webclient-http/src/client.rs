//! Async HTTP client.

use crate::executor::{ClientParts, Pipeline, PreparedRequest};
use crate::middleware::Middleware;
use crate::retry::retry_async;
use crate::tls::TlsContext;
use crate::transport::Transport;
use crate::{HttpClientConfig, HttpClientError, RequestSpec, Result};
use std::sync::Arc;
use tracing::debug;

/// Async client executing [`RequestSpec`]s with retries and a total
/// timeout.
///
/// Cheap to clone; clones share the connection pool and the middleware
/// chain. Safe to use from many tasks at once.
#[derive(Clone)]
pub struct WebServiceClient {
    pipeline: Pipeline,
}

impl WebServiceClient {
    /// Create a client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Create a client with default configuration.
    pub fn default_client() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Create a client builder.
    pub fn builder(config: HttpClientConfig) -> WebServiceClientBuilder {
        WebServiceClientBuilder {
            parts: ClientParts::new(config),
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        self.pipeline.config()
    }

    /// Execute a request and decode the response.
    ///
    /// Attempts are retried per the resolved retry policy. The whole call,
    /// retries and backoff included, is bounded by the request's timeout or
    /// the global one; when it elapses the in-flight attempt is dropped and
    /// [`HttpClientError::Timeout`] is returned. Dropping the returned future
    /// cancels the call.
    pub async fn execute<T>(&self, spec: RequestSpec<T>) -> Result<T> {
        let prepared = PreparedRequest::new(&spec)?;
        let chain = self.pipeline.chain_for(&spec);
        let policy = self.pipeline.retry_policy(&spec);
        let timeout = self.pipeline.timeout(&spec);

        debug!(
            method = %spec.method(),
            url = spec.url(),
            max_retries = policy.max_retries(),
            timeout_ms = timeout.as_millis() as u64,
            "Executing request"
        );

        let pipeline = &self.pipeline;
        let chain = chain.as_ref();
        let prepared = &prepared;
        let spec = &spec;
        let call = retry_async(&policy, move || pipeline.attempt(chain, prepared, spec));

        match tokio::time::timeout(timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(HttpClientError::Timeout(timeout)),
        }
    }
}

impl std::fmt::Debug for WebServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebServiceClient")
            .field("config", self.pipeline.config())
            .field("middleware", &self.pipeline.chain().stages().len())
            .finish()
    }
}

/// Builder for [`WebServiceClient`].
pub struct WebServiceClientBuilder {
    parts: ClientParts,
}

impl WebServiceClientBuilder {
    /// Send through `transport` instead of the pooled reqwest transport.
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.parts.transport = Some(transport);
        self
    }

    /// Use a prebuilt TLS context instead of building one from the config.
    pub fn tls_context(mut self, tls: TlsContext) -> Self {
        self.parts.tls = Some(tls);
        self
    }

    /// Add a stage to every request of this client.
    pub fn middleware(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.parts.middleware.push(stage);
        self
    }

    /// Build the client.
    pub fn build(self) -> Result<WebServiceClient> {
        Ok(WebServiceClient {
            pipeline: self.parts.into_pipeline()?,
        })
    }
}
