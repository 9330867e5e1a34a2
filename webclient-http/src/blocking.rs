//! Blocking HTTP client.
//!
//! Each call runs on the calling thread: attempts are driven to completion
//! on a private runtime and backoff delays sleep the thread. Do not call it
//! from inside an async runtime.

use crate::executor::{ClientParts, Pipeline, PreparedRequest};
use crate::interrupt;
use crate::middleware::Middleware;
use crate::retry::retry_blocking_with;
use crate::tls::TlsContext;
use crate::transport::Transport;
use crate::{HttpClientConfig, HttpClientError, RequestSpec, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

const RUNTIME_THREADS: usize = 2;

/// Blocking client executing [`RequestSpec`]s with retries and a total
/// timeout.
///
/// Cheap to clone; clones share the connection pool, the middleware chain
/// and the runtime. Safe to use from many threads at once. A blocked call
/// can be cancelled from another thread through the caller's
/// [`interrupt::InterruptHandle`].
#[derive(Clone)]
pub struct RestServiceClient {
    pipeline: Pipeline,
    runtime: Arc<Runtime>,
}

impl RestServiceClient {
    /// Create a client with the given configuration.
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Create a client with default configuration.
    pub fn default_client() -> Result<Self> {
        Self::new(HttpClientConfig::default())
    }

    /// Create a client builder.
    pub fn builder(config: HttpClientConfig) -> RestServiceClientBuilder {
        RestServiceClientBuilder {
            parts: ClientParts::new(config),
        }
    }

    /// Get the client configuration.
    pub fn config(&self) -> &HttpClientConfig {
        self.pipeline.config()
    }

    /// Execute a request on the calling thread and decode the response.
    ///
    /// Attempts are retried per the resolved retry policy. The request's
    /// timeout, or the global one, bounds the whole call including backoff
    /// delays; when it elapses the call fails with
    /// [`HttpClientError::Timeout`]. If the thread is interrupted before a
    /// retry or during a delay the call fails with
    /// [`HttpClientError::Interrupted`] and the interrupt flag stays set.
    pub fn execute<T>(&self, spec: RequestSpec<T>) -> Result<T> {
        let prepared = PreparedRequest::new(&spec)?;
        let chain = self.pipeline.chain_for(&spec);
        let policy = self.pipeline.retry_policy(&spec);
        let timeout = self.pipeline.timeout(&spec);
        let deadline = Instant::now() + timeout;

        tracing::debug!(
            method = %spec.method(),
            url = spec.url(),
            max_retries = policy.max_retries(),
            timeout_ms = timeout.as_millis() as u64,
            "Executing blocking request"
        );

        retry_blocking_with(
            &policy,
            || {
                let remaining = remaining(deadline, timeout)?;
                let attempt = self.pipeline.attempt(&chain, &prepared, &spec);
                self.runtime
                    .block_on(async { tokio::time::timeout(remaining, attempt).await })
                    .unwrap_or(Err(HttpClientError::Timeout(timeout)))
            },
            |delay| {
                let remaining = remaining(deadline, timeout)?;
                if delay >= remaining {
                    interrupt::sleep(remaining)?;
                    return Err(HttpClientError::Timeout(timeout));
                }
                interrupt::sleep(delay)
            },
        )
    }
}

fn remaining(deadline: Instant, timeout: Duration) -> Result<Duration> {
    let remaining = deadline.saturating_duration_since(Instant::now());
    if remaining.is_zero() {
        return Err(HttpClientError::Timeout(timeout));
    }
    Ok(remaining)
}

impl std::fmt::Debug for RestServiceClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestServiceClient")
            .field("config", self.pipeline.config())
            .field("middleware", &self.pipeline.chain().stages().len())
            .finish()
    }
}

/// Builder for [`RestServiceClient`].
pub struct RestServiceClientBuilder {
    parts: ClientParts,
}

impl RestServiceClientBuilder {
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

    /// Build the client and its private runtime.
    pub fn build(self) -> Result<RestServiceClient> {
        let pipeline = self.parts.into_pipeline()?;
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(RUNTIME_THREADS)
            .thread_name("webclient-blocking")
            .enable_all()
            .build()?;
        Ok(RestServiceClient {
            pipeline,
            runtime: Arc::new(runtime),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::ResponseType;
    use crate::test_support::ScriptedTransport;

    fn client(transport: Arc<ScriptedTransport>, interval: Duration) -> RestServiceClient {
        let config = HttpClientConfig::builder().retry_interval(interval).build();
        RestServiceClient::builder(config)
            .transport(transport)
            .build()
            .unwrap()
    }

    fn spec() -> crate::RequestSpecBuilder<String> {
        RequestSpec::builder()
            .url("https://example.com/items")
            .response_type(ResponseType::text())
    }

    #[test]
    fn test_retries_then_succeeds() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok((503, "")), Ok((200, "done"))]));

        let body = client(transport.clone(), Duration::from_millis(10))
            .execute(spec().build().unwrap())
            .unwrap();

        assert_eq!(body, "done");
        assert_eq!(transport.calls(), 2);
    }

    #[test]
    fn test_zero_retries_is_single_attempt() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok((500, ""))]));

        let err = client(transport.clone(), Duration::from_millis(10))
            .execute(spec().max_retries(0).build().unwrap())
            .unwrap_err();

        assert_eq!(err.status_code(), Some(500));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_timeout_cuts_backoff_short() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok((500, "")), Ok((500, ""))]));
        let start = Instant::now();

        let err = client(transport.clone(), Duration::from_secs(10))
            .execute(spec().timeout_ms(100).build().unwrap())
            .unwrap_err();

        assert!(err.is_timeout());
        assert!(start.elapsed() < Duration::from_secs(5));
        assert_eq!(transport.calls(), 1);
    }

    #[test]
    fn test_interrupt_cancels_backoff() {
        let transport = Arc::new(ScriptedTransport::new(vec![Ok((500, "")), Ok((500, ""))]));
        let client = client(transport.clone(), Duration::from_secs(30));
        let (tx, rx) = std::sync::mpsc::channel();

        let caller = std::thread::spawn(move || {
            tx.send(interrupt::current()).unwrap();
            let result = client.execute(spec().build().unwrap());
            (result, interrupt::is_interrupted())
        });

        let handle = rx.recv().unwrap();
        std::thread::sleep(Duration::from_millis(100));
        handle.interrupt();

        let (result, still_interrupted) = caller.join().unwrap();
        assert!(matches!(result, Err(HttpClientError::Interrupted)));
        assert!(still_interrupted);
        assert_eq!(transport.calls(), 1);
    }
}
