//! HTTP client error types.

use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Result type for HTTP client operations.
pub type Result<T> = std::result::Result<T, HttpClientError>;

/// Why an exchange never produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    /// Connection refused or reset before the request was written.
    Connect,
    /// Host name could not be resolved.
    Dns,
    /// Connection could not be established in time.
    ConnectTimeout,
    /// No pooled connection slot became available in time.
    PoolTimeout,
    /// The server did not answer a single attempt in time.
    Timeout,
    /// Socket failure while writing the request or reading the response.
    Io,
    /// TLS handshake failure.
    Tls,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Connect => "connect",
            Self::Dns => "dns",
            Self::ConnectTimeout => "connect timeout",
            Self::PoolTimeout => "pool acquire timeout",
            Self::Timeout => "timeout",
            Self::Io => "io",
            Self::Tls => "tls",
        };
        f.write_str(text)
    }
}

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum HttpClientError {
    /// The server answered with a status the executor does not decode.
    #[error("HTTP {} {reason}", .status.as_u16())]
    Status {
        /// HTTP status code.
        status: StatusCode,
        /// Reason phrase.
        reason: String,
        /// Response headers.
        headers: HeaderMap,
        /// Raw response body.
        body: Bytes,
    },

    /// The exchange never produced a response.
    #[error("Transport error ({kind}): {message}")]
    Transport {
        /// Failure category.
        kind: TransportErrorKind,
        /// Error message.
        message: String,
    },

    /// The total timeout of a call elapsed.
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// The response body could not be decoded.
    #[error("Failed to decode response body: {0}")]
    Decode(String),

    /// Invalid request or client configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Keystore, truststore or TLS context construction failed.
    #[error("Failed to initialize TLS context: {message}")]
    TlsInitialization {
        /// Error message.
        message: String,
    },

    /// A blocking retry sleep was interrupted.
    #[error("Retry interrupted")]
    Interrupted,

    /// A middleware stage short-circuited the call.
    #[error("Middleware error: {0}")]
    Middleware(String),

    /// Network I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl HttpClientError {
    pub(crate) fn transport(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self::Transport {
            kind,
            message: message.into(),
        }
    }

    pub(crate) fn tls(message: impl Into<String>) -> Self {
        Self::TlsInitialization {
            message: message.into(),
        }
    }

    /// Build a status error from the parts of a received response.
    pub fn from_status(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self::Status {
            status,
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
            headers,
            body,
        }
    }

    /// Stable name of the error kind, used in retry logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Status { .. } => "HttpStatusError",
            Self::Transport { .. } => "TransportError",
            Self::Timeout(_) => "TimeoutError",
            Self::Decode(_) => "DecodingError",
            Self::Config(_) => "ConfigError",
            Self::TlsInitialization { .. } => "TlsInitializationError",
            Self::Interrupted => "InterruptedError",
            Self::Middleware(_) => "MiddlewareError",
            Self::Io(_) => "IoError",
        }
    }

    /// Check if this is the total-timeout error.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout(_))
    }

    /// Check if the exchange never produced a response.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport { .. } | Self::Io(_))
    }

    /// Get the HTTP status code if this is a status error.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(status.as_u16()),
            _ => None,
        }
    }

    /// Raw body of a status error.
    pub fn body(&self) -> Option<&Bytes> {
        match self {
            Self::Status { body, .. } => Some(body),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for HttpClientError {
    fn from(err: reqwest::Error) -> Self {
        let message = err.to_string();
        if err.is_builder() {
            return Self::Config(message);
        }
        if err.is_decode() {
            return Self::Decode(message);
        }
        if err.is_connect() {
            let kind = if err.is_timeout() {
                TransportErrorKind::ConnectTimeout
            } else if looks_like_dns_failure(&err) {
                TransportErrorKind::Dns
            } else {
                TransportErrorKind::Connect
            };
            return Self::transport(kind, message);
        }
        if err.is_timeout() {
            return Self::transport(TransportErrorKind::Timeout, message);
        }
        Self::transport(TransportErrorKind::Io, message)
    }
}

fn looks_like_dns_failure(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn std::error::Error + 'static)> = std::error::Error::source(err);
    while let Some(current) = source {
        let text = current.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        source = current.source();
    }
    false
}
