//! HTTP client configuration.

use crate::{HttpClientError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Semaphore;

/// Store format understood by the TLS builder.
pub const STORE_TYPE_PKCS12: &str = "PKCS12";
/// PEM store format.
pub const STORE_TYPE_PEM: &str = "PEM";

/// Supported values of `tlsProtocol`.
pub const TLS_PROTOCOLS: [&str; 3] = ["TLSv1.2", "TLSv1.3", "TLS"];

/// Process-wide HTTP client configuration.
///
/// Read-only once the client is built. Every field has a default, so a
/// partial document (or none at all) yields a usable configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HttpClientConfig {
    /// TLS settings.
    pub ssl: SslConfig,
    /// Connection pool bounds.
    pub pool: PoolConfig,
    /// Timeouts.
    pub timeout: TimeoutConfig,
    /// Global retry budget.
    pub retry: RetryConfig,
    /// Response handling.
    pub response: ResponseConfig,
}

/// TLS settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SslConfig {
    /// Whether a custom TLS context is built at all.
    pub enabled: bool,
    /// Accept every server certificate. Development only.
    pub bypass_verification: bool,
    /// Protocol version: `TLSv1.2`, `TLSv1.3` or `TLS` (both).
    pub tls_protocol: String,
    /// Client keystore path.
    pub keystore_path: Option<String>,
    /// Client keystore password.
    pub keystore_password: Option<String>,
    /// Client keystore format.
    pub keystore_type: String,
    /// Truststore path.
    pub truststore_path: Option<String>,
    /// Truststore password.
    pub truststore_password: Option<String>,
    /// Truststore format.
    pub truststore_type: String,
    /// Alias of the client key to present during mutual TLS.
    pub key_alias_name: Option<String>,
}

impl Default for SslConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            bypass_verification: false,
            tls_protocol: "TLSv1.2".to_string(),
            keystore_path: None,
            keystore_password: None,
            keystore_type: STORE_TYPE_PKCS12.to_string(),
            truststore_path: None,
            truststore_password: None,
            truststore_type: STORE_TYPE_PKCS12.to_string(),
            key_alias_name: None,
        }
    }
}

impl SslConfig {
    /// Configured key alias, ignoring blank values.
    pub fn key_alias(&self) -> Option<&str> {
        non_blank(self.key_alias_name.as_deref())
    }

    /// Configured keystore path, ignoring blank values.
    pub fn keystore(&self) -> Option<&str> {
        non_blank(self.keystore_path.as_deref())
    }

    /// Configured truststore path, ignoring blank values.
    pub fn truststore(&self) -> Option<&str> {
        non_blank(self.truststore_path.as_deref())
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.trim().is_empty())
}

/// Connection pool bounds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct PoolConfig {
    /// Maximum in-flight connections across all routes.
    pub max_connections: usize,
    /// Maximum in-flight connections to one `scheme://host:port`.
    pub max_connections_per_route: usize,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_connections: 500,
            max_connections_per_route: 50,
        }
    }
}

/// Timeouts, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimeoutConfig {
    /// Connect timeout and pool acquisition wait.
    pub connect_request_timeout_ms: u64,
    /// Total timeout of one call, retries included.
    pub timeout_ms: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_request_timeout_ms: 5_000,
            timeout_ms: 30_000,
        }
    }
}

impl TimeoutConfig {
    /// Connect / pool acquisition timeout.
    pub fn connect_request_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_request_timeout_ms)
    }

    /// Total call timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Global retry budget.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryConfig {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Initial backoff; doubles on every retry.
    pub retry_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_interval_ms: 1_000,
        }
    }
}

/// Response handling.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ResponseConfig {
    /// Decode every 2xx status instead of only `200 OK`.
    pub accept_all_2xx: bool,
}

impl HttpClientConfig {
    /// Create a new configuration builder.
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }

    /// Check the configuration for values the client cannot honor.
    pub fn validate(&self) -> Result<()> {
        if self.pool.max_connections == 0 {
            return Err(invalid("pool.maxConnections must be greater than 0"));
        }
        if self.pool.max_connections_per_route == 0 {
            return Err(invalid("pool.maxConnectionsPerRoute must be greater than 0"));
        }
        if self.pool.max_connections > Semaphore::MAX_PERMITS {
            return Err(invalid(format!(
                "pool.maxConnections must not exceed {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.pool.max_connections_per_route > self.pool.max_connections {
            return Err(invalid(
                "pool.maxConnectionsPerRoute must not exceed pool.maxConnections",
            ));
        }
        if self.timeout.connect_request_timeout_ms == 0 {
            return Err(invalid("timeout.connectRequestTimeoutMs must be greater than 0"));
        }
        if self.timeout.timeout_ms == 0 {
            return Err(invalid("timeout.timeoutMs must be greater than 0"));
        }
        if !TLS_PROTOCOLS.contains(&self.ssl.tls_protocol.as_str()) {
            return Err(invalid(format!(
                "ssl.tlsProtocol '{}' is not one of {:?}",
                self.ssl.tls_protocol, TLS_PROTOCOLS
            )));
        }
        for (key, value) in [
            ("ssl.keystoreType", &self.ssl.keystore_type),
            ("ssl.truststoreType", &self.ssl.truststore_type),
        ] {
            if !is_known_store_type(value) {
                return Err(invalid(format!(
                    "{key} '{value}' is not one of [\"{STORE_TYPE_PKCS12}\", \"{STORE_TYPE_PEM}\"]"
                )));
            }
        }
        Ok(())
    }
}

pub(crate) fn is_known_store_type(value: &str) -> bool {
    value.eq_ignore_ascii_case(STORE_TYPE_PKCS12) || value.eq_ignore_ascii_case(STORE_TYPE_PEM)
}

fn invalid(message: impl Into<String>) -> HttpClientError {
    HttpClientError::Config(message.into())
}

/// Builder for HTTP client configuration.
#[derive(Debug, Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Replace the TLS settings.
    pub fn ssl(mut self, ssl: SslConfig) -> Self {
        self.config.ssl = ssl;
        self
    }

    /// Set the maximum number of pooled connections.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.config.pool.max_connections = max;
        self
    }

    /// Set the maximum number of pooled connections per route.
    pub fn max_connections_per_route(mut self, max: usize) -> Self {
        self.config.pool.max_connections_per_route = max;
        self
    }

    /// Set the connect and pool acquisition timeout.
    pub fn connect_request_timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout.connect_request_timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the default total timeout of a call.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Set the global retry budget.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.config.retry.max_retries = max_retries;
        self
    }

    /// Set the global initial backoff.
    pub fn retry_interval(mut self, interval: Duration) -> Self {
        self.config.retry.retry_interval_ms = interval.as_millis() as u64;
        self
    }

    /// Decode every 2xx status instead of only `200 OK`.
    pub fn accept_all_2xx(mut self, enable: bool) -> Self {
        self.config.response.accept_all_2xx = enable;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}
