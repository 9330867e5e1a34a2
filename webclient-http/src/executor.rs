//! Request pipeline shared by the async and blocking clients.

use crate::config::HttpClientConfig;
use crate::middleware::{Middleware, MiddlewareChain};
use crate::request::RequestSpec;
use crate::retry::RetryPolicy;
use crate::tls::{TlsContext, TlsContextBuilder};
use crate::transport::{ReqwestTransport, Transport};
use crate::{HttpClientError, Response, Result};
use bytes::Bytes;
use http::header::{ACCEPT, CONTENT_TYPE};
use http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

/// Client parts collected by the builders.
pub(crate) struct ClientParts {
    pub(crate) config: HttpClientConfig,
    pub(crate) transport: Option<Arc<dyn Transport>>,
    pub(crate) tls: Option<TlsContext>,
    pub(crate) middleware: Vec<Arc<dyn Middleware>>,
}

impl ClientParts {
    pub(crate) fn new(config: HttpClientConfig) -> Self {
        Self {
            config,
            transport: None,
            tls: None,
            middleware: Vec::new(),
        }
    }

    /// Validate the configuration and assemble the shared chain.
    pub(crate) fn into_pipeline(self) -> Result<Pipeline> {
        self.config.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => {
                let tls = match self.tls {
                    Some(tls) => Some(tls),
                    None => TlsContextBuilder::new(self.config.ssl.clone()).build()?,
                };
                Arc::new(ReqwestTransport::new(&self.config, tls.as_ref())?) as Arc<dyn Transport>
            }
        };

        Ok(Pipeline {
            chain: MiddlewareChain::new(transport).with_all(self.middleware),
            config: Arc::new(self.config),
        })
    }
}

/// The shared chain plus the global settings.
#[derive(Clone)]
pub(crate) struct Pipeline {
    chain: MiddlewareChain,
    config: Arc<HttpClientConfig>,
}

impl Pipeline {
    pub(crate) fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    pub(crate) fn chain(&self) -> &MiddlewareChain {
        &self.chain
    }

    /// The shared chain when the call adds no stages, else a derived chain
    /// with the call's stages merged in.
    pub(crate) fn chain_for<T>(&self, spec: &RequestSpec<T>) -> Cow<'_, MiddlewareChain> {
        if spec.middleware().is_empty() {
            Cow::Borrowed(&self.chain)
        } else {
            Cow::Owned(self.chain.clone().with_all(spec.middleware().iter().cloned()))
        }
    }

    pub(crate) fn retry_policy<T>(&self, spec: &RequestSpec<T>) -> RetryPolicy {
        RetryPolicy::resolve(spec.max_retries(), spec.retry_interval_ms(), &self.config.retry)
    }

    /// Total timeout of the call, retries included.
    pub(crate) fn timeout<T>(&self, spec: &RequestSpec<T>) -> Duration {
        spec.timeout().unwrap_or_else(|| self.config.timeout.timeout())
    }

    /// One attempt: fresh request through the chain, then decoding.
    pub(crate) async fn attempt<T>(
        &self,
        chain: &MiddlewareChain,
        prepared: &PreparedRequest,
        spec: &RequestSpec<T>,
    ) -> Result<T> {
        let response = chain.execute(prepared.to_request()).await?;
        decode(response, spec, self.config.response.accept_all_2xx)
    }
}

/// Method, URL, headers and encoded body of a call, built once and copied
/// into a new request for every attempt.
#[derive(Debug, Clone)]
pub(crate) struct PreparedRequest {
    method: Method,
    url: url::Url,
    headers: HeaderMap,
    body: Option<Bytes>,
}

impl PreparedRequest {
    pub(crate) fn new<T>(spec: &RequestSpec<T>) -> Result<Self> {
        let url = url::Url::parse(spec.url())
            .map_err(|e| HttpClientError::Config(format!("Invalid url {}: {}", spec.url(), e)))?;

        let mut headers = HeaderMap::new();
        for (name, value) in spec.headers() {
            headers.insert(header_name(name)?, header_value(value)?);
        }
        if let Some(content_type) = spec.content_type() {
            headers.insert(CONTENT_TYPE, header_value(content_type)?);
        }
        if let Some(accept) = spec.accept_type() {
            headers.insert(ACCEPT, header_value(accept)?);
        }

        let body = match spec.body() {
            Some(body) => {
                let declared = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
                let (bytes, default_type) = body.encode(declared)?;
                if let Some(default_type) = default_type
                    && !headers.contains_key(CONTENT_TYPE)
                {
                    headers.insert(CONTENT_TYPE, HeaderValue::from_static(default_type));
                }
                Some(bytes)
            }
            None => None,
        };

        Ok(Self {
            method: spec.method().clone(),
            url,
            headers,
            body,
        })
    }

    pub(crate) fn to_request(&self) -> reqwest::Request {
        let mut request = reqwest::Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();
        if let Some(body) = &self.body {
            *request.body_mut() = Some(reqwest::Body::from(body.clone()));
        }
        request
    }
}

fn header_name(name: &str) -> Result<HeaderName> {
    HeaderName::try_from(name)
        .map_err(|e| HttpClientError::Config(format!("Invalid header name {}: {}", name, e)))
}

fn header_value(value: &str) -> Result<HeaderValue> {
    HeaderValue::try_from(value)
        .map_err(|e| HttpClientError::Config(format!("Invalid header value {}: {}", value, e)))
}

/// Decode a response, or turn it into a status error.
///
/// Only `200 OK` is decoded unless `accept_all_2xx` widens it to every 2xx.
pub(crate) fn decode<T>(response: Response, spec: &RequestSpec<T>, accept_all_2xx: bool) -> Result<T> {
    let status = response.status();
    let accepted = status == StatusCode::OK || (accept_all_2xx && status.is_success());
    if !accepted {
        return Err(response.into_error());
    }
    spec.response_type().decode(&response)
}
