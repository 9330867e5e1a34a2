//! The transport at the end of every middleware chain.

use crate::config::HttpClientConfig;
use crate::error::TransportErrorKind;
use crate::tls::TlsContext;
use crate::{HttpClientError, Response, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use reqwest::Request;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Idle connections are closed after this long.
pub const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Idle routes are swept from the limiter at most this often.
pub const POOL_EVICTION_INTERVAL: Duration = Duration::from_secs(120);

const USER_AGENT: &str = concat!("webclient-http/", env!("CARGO_PKG_VERSION"));

/// Sends one request and buffers the response.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send the request. Any status counts as a response; only failures
    /// that produced no response are errors.
    async fn send(&self, request: Request) -> Result<Response>;
}

/// Pooled reqwest transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
    limiter: Option<ConnectionLimiter>,
}

impl ReqwestTransport {
    /// Build a pooled transport from the client settings.
    ///
    /// `tls` replaces the default rustls setup when given.
    pub fn new(config: &HttpClientConfig, tls: Option<&TlsContext>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(config.timeout.connect_request_timeout())
            .timeout(config.timeout.timeout())
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .pool_max_idle_per_host(config.pool.max_connections_per_route)
            .redirect(reqwest::redirect::Policy::none());

        if let Some(tls) = tls {
            builder = builder.use_preconfigured_tls(tls.client_config().clone());
        }

        let client = builder
            .build()
            .map_err(|e| HttpClientError::Config(format!("Failed to build HTTP client: {}", e)))?;

        tracing::debug!(
            max_connections = config.pool.max_connections,
            max_connections_per_route = config.pool.max_connections_per_route,
            tls = tls.is_some(),
            "Created pooled HTTP transport"
        );

        Ok(Self {
            client,
            limiter: Some(ConnectionLimiter::new(
                config.pool.max_connections,
                config.pool.max_connections_per_route,
                config.timeout.connect_request_timeout(),
            )),
        })
    }

    /// Wrap an existing reqwest client without connection limits.
    pub fn from_client(client: reqwest::Client) -> Self {
        Self {
            client,
            limiter: None,
        }
    }

    /// Get the underlying reqwest client.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: Request) -> Result<Response> {
        let _permit = match &self.limiter {
            Some(limiter) => Some(limiter.acquire(&route_key(request.url())).await?),
            None => None,
        };
        let response = self.client.execute(request).await?;
        Response::from_reqwest(response).await
    }
}

/// Route key `scheme://host:port`.
pub(crate) fn route_key(url: &url::Url) -> String {
    format!(
        "{}://{}:{}",
        url.scheme(),
        url.host_str().unwrap_or_default(),
        url.port_or_known_default().unwrap_or_default()
    )
}

/// Bounds in-flight exchanges globally and per route.
///
/// A caller that cannot get both permits within the acquire timeout fails
/// with a pool-timeout transport error.
#[derive(Debug, Clone)]
pub(crate) struct ConnectionLimiter {
    inner: Arc<LimiterInner>,
}

#[derive(Debug)]
struct LimiterInner {
    global: Arc<Semaphore>,
    per_route: usize,
    acquire_timeout: Duration,
    routes: Mutex<RouteTable>,
}

#[derive(Debug)]
struct RouteTable {
    entries: HashMap<String, RouteEntry>,
    last_sweep: Instant,
}

#[derive(Debug)]
struct RouteEntry {
    semaphore: Arc<Semaphore>,
    last_used: Instant,
}

/// Held for the duration of one exchange.
#[derive(Debug)]
pub(crate) struct ConnectionPermit {
    _route: OwnedSemaphorePermit,
    _global: OwnedSemaphorePermit,
}

impl ConnectionLimiter {
    pub(crate) fn new(max_connections: usize, per_route: usize, acquire_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(LimiterInner {
                global: Arc::new(Semaphore::new(max_connections)),
                per_route,
                acquire_timeout,
                routes: Mutex::new(RouteTable {
                    entries: HashMap::new(),
                    last_sweep: Instant::now(),
                }),
            }),
        }
    }

    pub(crate) async fn acquire(&self, route: &str) -> Result<ConnectionPermit> {
        let route_semaphore = self.route_semaphore(route, Instant::now());
        let global = self.inner.global.clone();

        let acquire = async move {
            let route = route_semaphore.acquire_owned().await?;
            let global = global.acquire_owned().await?;
            Ok::<_, tokio::sync::AcquireError>(ConnectionPermit {
                _route: route,
                _global: global,
            })
        };

        match tokio::time::timeout(self.inner.acquire_timeout, acquire).await {
            Ok(Ok(permit)) => Ok(permit),
            Ok(Err(_)) => Err(HttpClientError::transport(
                TransportErrorKind::PoolTimeout,
                "connection pool closed",
            )),
            Err(_) => {
                tracing::debug!(route, "Timed out waiting for a pooled connection");
                Err(HttpClientError::transport(
                    TransportErrorKind::PoolTimeout,
                    format!(
                        "no connection to {} available within {}ms",
                        route,
                        self.inner.acquire_timeout.as_millis()
                    ),
                ))
            }
        }
    }

    fn route_semaphore(&self, route: &str, now: Instant) -> Arc<Semaphore> {
        let mut routes = self.inner.routes.lock();
        if now.saturating_duration_since(routes.last_sweep) >= POOL_EVICTION_INTERVAL {
            routes.sweep(now, self.inner.per_route);
        }
        let per_route = self.inner.per_route;
        let entry = routes
            .entries
            .entry(route.to_string())
            .or_insert_with(|| RouteEntry {
                semaphore: Arc::new(Semaphore::new(per_route)),
                last_used: now,
            });
        entry.last_used = now;
        entry.semaphore.clone()
    }

    #[cfg(test)]
    fn route_count(&self) -> usize {
        self.inner.routes.lock().entries.len()
    }
}

impl RouteTable {
    /// Drop routes with no exchange in flight that were idle for the pool
    /// idle timeout.
    fn sweep(&mut self, now: Instant, per_route: usize) {
        self.entries.retain(|_, entry| {
            let busy = entry.semaphore.available_permits() < per_route;
            busy || now.saturating_duration_since(entry.last_used) < POOL_IDLE_TIMEOUT
        });
        self.last_sweep = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_route_key() {
        let url = url::Url::parse("https://api.example.com/items?page=2").unwrap();
        assert_eq!(route_key(&url), "https://api.example.com:443");

        let url = url::Url::parse("http://localhost:8080/").unwrap();
        assert_eq!(route_key(&url), "http://localhost:8080");
    }

    #[tokio::test(start_paused = true)]
    async fn test_route_limit_times_out() {
        let limiter = ConnectionLimiter::new(10, 1, Duration::from_millis(100));
        let _held = limiter.acquire("http://a:80").await.unwrap();

        let err = limiter.acquire("http://a:80").await.unwrap_err();
        assert!(matches!(
            err,
            HttpClientError::Transport {
                kind: TransportErrorKind::PoolTimeout,
                ..
            }
        ));

        // Other routes are unaffected.
        assert!(limiter.acquire("http://b:80").await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_global_limit_spans_routes() {
        let limiter = ConnectionLimiter::new(1, 1, Duration::from_millis(100));
        let held = limiter.acquire("http://a:80").await.unwrap();
        assert!(limiter.acquire("http://b:80").await.is_err());

        drop(held);
        assert!(limiter.acquire("http://b:80").await.is_ok());
    }

    #[tokio::test]
    async fn test_sweep_drops_idle_routes_only() {
        let limiter = ConnectionLimiter::new(10, 2, Duration::from_millis(100));
        let _busy = limiter.acquire("http://busy:80").await.unwrap();
        drop(limiter.acquire("http://idle:80").await.unwrap());
        assert_eq!(limiter.route_count(), 2);

        let later = Instant::now() + POOL_EVICTION_INTERVAL + Duration::from_secs(1);
        limiter.route_semaphore("http://fresh:80", later);

        let routes = limiter.inner.routes.lock();
        assert!(routes.entries.contains_key("http://busy:80"));
        assert!(routes.entries.contains_key("http://fresh:80"));
        assert!(!routes.entries.contains_key("http://idle:80"));
    }
}
