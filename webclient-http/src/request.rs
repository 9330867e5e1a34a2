//! Immutable description of one outbound call.

use crate::middleware::Middleware;
use crate::{HttpClientError, Response, Result};
use bytes::Bytes;
use http::{HeaderName, HeaderValue, Method};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Common media types.
pub mod media_type {
    /// `application/json`
    pub const APPLICATION_JSON: &str = "application/json";
    /// `application/x-www-form-urlencoded`
    pub const APPLICATION_FORM_URLENCODED: &str = "application/x-www-form-urlencoded";
    /// `application/octet-stream`
    pub const APPLICATION_OCTET_STREAM: &str = "application/octet-stream";
    /// `text/plain; charset=utf-8`
    pub const TEXT_PLAIN: &str = "text/plain; charset=utf-8";
    /// `*/*`
    pub const ALL: &str = "*/*";
}

/// Request payload. Encoded according to the content type when sent.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    /// Raw bytes, sent as is.
    Bytes(Bytes),
    /// UTF-8 text.
    Text(String),
    /// JSON value; form-encoded when the content type asks for it.
    Json(serde_json::Value),
    /// Form fields.
    Form(Vec<(String, String)>),
}

impl RequestBody {
    /// Encode the payload for the given content type.
    ///
    /// Returns the bytes and the content type to apply when none was set.
    pub fn encode(&self, content_type: Option<&str>) -> Result<(Bytes, Option<&'static str>)> {
        let wants_form = content_type
            .is_some_and(|ct| ct.starts_with(media_type::APPLICATION_FORM_URLENCODED));

        match self {
            Self::Bytes(bytes) => Ok((bytes.clone(), None)),
            Self::Text(text) => Ok((
                Bytes::copy_from_slice(text.as_bytes()),
                Some(media_type::TEXT_PLAIN),
            )),
            Self::Json(value) if wants_form => {
                let encoded = serde_urlencoded::to_string(value)
                    .map_err(|e| HttpClientError::Config(format!("Form encoding failed: {}", e)))?;
                Ok((Bytes::from(encoded), None))
            }
            Self::Json(value) => {
                let encoded = serde_json::to_vec(value)
                    .map_err(|e| HttpClientError::Config(format!("JSON encoding failed: {}", e)))?;
                Ok((Bytes::from(encoded), Some(media_type::APPLICATION_JSON)))
            }
            Self::Form(fields) => {
                let encoded = serde_urlencoded::to_string(fields)
                    .map_err(|e| HttpClientError::Config(format!("Form encoding failed: {}", e)))?;
                Ok((
                    Bytes::from(encoded),
                    Some(media_type::APPLICATION_FORM_URLENCODED),
                ))
            }
        }
    }
}

impl From<&str> for RequestBody {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

impl From<String> for RequestBody {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<Vec<u8>> for RequestBody {
    fn from(bytes: Vec<u8>) -> Self {
        Self::Bytes(Bytes::from(bytes))
    }
}

impl From<Bytes> for RequestBody {
    fn from(bytes: Bytes) -> Self {
        Self::Bytes(bytes)
    }
}

impl From<serde_json::Value> for RequestBody {
    fn from(value: serde_json::Value) -> Self {
        Self::Json(value)
    }
}

type DecodeFn<T> = dyn Fn(&Response) -> Result<T> + Send + Sync;

/// Describes how a successful response body becomes a `T`.
pub struct ResponseType<T> {
    name: &'static str,
    decode: Arc<DecodeFn<T>>,
}

impl<T> ResponseType<T> {
    /// Decode with a custom function.
    pub fn custom<F>(name: &'static str, decode: F) -> Self
    where
        F: Fn(&Response) -> Result<T> + Send + Sync + 'static,
    {
        Self {
            name,
            decode: Arc::new(decode),
        }
    }

    /// Name of the target type, for diagnostics.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Decode a response body.
    pub fn decode(&self, response: &Response) -> Result<T> {
        (self.decode)(response)
    }
}

impl<T: DeserializeOwned> ResponseType<T> {
    /// Deserialize the body as JSON.
    pub fn json() -> Self {
        Self::custom(std::any::type_name::<T>(), |response| response.json())
    }
}

impl ResponseType<String> {
    /// Read the body as UTF-8 text.
    pub fn text() -> Self {
        Self::custom("String", |response| response.text())
    }
}

impl ResponseType<Bytes> {
    /// Keep the raw body.
    pub fn bytes() -> Self {
        Self::custom("Bytes", |response| Ok(response.bytes().clone()))
    }
}

impl ResponseType<()> {
    /// Ignore the body.
    pub fn discard() -> Self {
        Self::custom("()", |_| Ok(()))
    }
}

impl<T> Clone for ResponseType<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            decode: Arc::clone(&self.decode),
        }
    }
}

impl<T> fmt::Debug for ResponseType<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ResponseType").field(&self.name).finish()
    }
}

/// Immutable specification of one call.
///
/// Built with [`RequestSpec::builder`]; the URL and the response type are
/// mandatory. Collections are copied at build time and only exposed by
/// shared reference.
pub struct RequestSpec<T> {
    url: String,
    method: Method,
    headers: HashMap<String, String>,
    content_type: Option<String>,
    accept_type: Option<String>,
    body: Option<RequestBody>,
    response_type: ResponseType<T>,
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_interval_ms: Option<u64>,
    middleware: Vec<Arc<dyn Middleware>>,
}

impl<T> RequestSpec<T> {
    /// Start building a request specification.
    pub fn builder() -> RequestSpecBuilder<T> {
        RequestSpecBuilder::default()
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Caller-supplied headers.
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Content type of the body.
    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// Accepted response media type.
    pub fn accept_type(&self) -> Option<&str> {
        self.accept_type.as_deref()
    }

    /// Request payload.
    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    /// Response decoder.
    pub fn response_type(&self) -> &ResponseType<T> {
        &self.response_type
    }

    /// Per-call total timeout override, in milliseconds.
    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout_ms
    }

    /// Per-call total timeout override.
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_ms.map(Duration::from_millis)
    }

    /// Per-call retry budget override. `Some(0)` disables retries.
    pub fn max_retries(&self) -> Option<u32> {
        self.max_retries
    }

    /// Per-call initial backoff override, in milliseconds.
    pub fn retry_interval_ms(&self) -> Option<u64> {
        self.retry_interval_ms
    }

    /// Per-call middleware, in declared order.
    pub fn middleware(&self) -> &[Arc<dyn Middleware>] {
        &self.middleware
    }
}

impl<T> Clone for RequestSpec<T> {
    fn clone(&self) -> Self {
        Self {
            url: self.url.clone(),
            method: self.method.clone(),
            headers: self.headers.clone(),
            content_type: self.content_type.clone(),
            accept_type: self.accept_type.clone(),
            body: self.body.clone(),
            response_type: self.response_type.clone(),
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
            retry_interval_ms: self.retry_interval_ms,
            middleware: self.middleware.clone(),
        }
    }
}

impl<T> fmt::Debug for RequestSpec<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestSpec")
            .field("url", &self.url)
            .field("method", &self.method)
            .field("headers", &self.headers)
            .field("content_type", &self.content_type)
            .field("accept_type", &self.accept_type)
            .field("body", &self.body)
            .field("response_type", &self.response_type)
            .field("timeout_ms", &self.timeout_ms)
            .field("max_retries", &self.max_retries)
            .field("retry_interval_ms", &self.retry_interval_ms)
            .field("middleware", &self.middleware.len())
            .finish()
    }
}

/// Builder for [`RequestSpec`].
pub struct RequestSpecBuilder<T> {
    url: Option<String>,
    method: Method,
    headers: HashMap<String, String>,
    content_type: Option<String>,
    accept_type: Option<String>,
    body: Option<RequestBody>,
    response_type: Option<ResponseType<T>>,
    timeout_ms: Option<u64>,
    max_retries: Option<u32>,
    retry_interval_ms: Option<u64>,
    middleware: Vec<Arc<dyn Middleware>>,
    error: Option<String>,
}

impl<T> Default for RequestSpecBuilder<T> {
    fn default() -> Self {
        Self {
            url: None,
            method: Method::GET,
            headers: HashMap::new(),
            content_type: None,
            accept_type: None,
            body: None,
            response_type: None,
            timeout_ms: None,
            max_retries: None,
            retry_interval_ms: None,
            middleware: Vec::new(),
            error: None,
        }
    }
}

impl<T> RequestSpecBuilder<T> {
    /// Set the target URL.
    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Set the HTTP method (default `GET`).
    pub fn method(mut self, method: Method) -> Self {
        self.method = method;
        self
    }

    /// Replace all headers.
    pub fn headers<I, K, V>(mut self, headers: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.headers = headers
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self
    }

    /// Set a single header, replacing any previous value.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the body content type.
    pub fn content_type(mut self, media_type: impl Into<String>) -> Self {
        self.content_type = Some(media_type.into());
        self
    }

    /// Set the accepted response media type.
    pub fn accept_type(mut self, media_type: impl Into<String>) -> Self {
        self.accept_type = Some(media_type.into());
        self
    }

    /// Set the request payload.
    pub fn body(mut self, body: impl Into<RequestBody>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize a value into a JSON payload.
    pub fn json<B: Serialize + ?Sized>(mut self, body: &B) -> Self {
        match serde_json::to_value(body) {
            Ok(value) => self.body = Some(RequestBody::Json(value)),
            Err(e) => self.error = Some(format!("Failed to serialize JSON body: {}", e)),
        }
        self
    }

    /// Set the response decoder.
    pub fn response_type(mut self, response_type: ResponseType<T>) -> Self {
        self.response_type = Some(response_type);
        self
    }

    /// Override the total timeout for this call, in milliseconds.
    pub fn timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    /// Override the retry budget for this call. `0` disables retries.
    pub fn max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = Some(max_retries);
        self
    }

    /// Override the initial backoff for this call, in milliseconds.
    pub fn retry_interval_ms(mut self, retry_interval_ms: u64) -> Self {
        self.retry_interval_ms = Some(retry_interval_ms);
        self
    }

    /// Append a middleware stage.
    pub fn middleware(mut self, stage: Arc<dyn Middleware>) -> Self {
        self.middleware.push(stage);
        self
    }

    /// Replace the middleware list.
    pub fn middlewares<I>(mut self, stages: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn Middleware>>,
    {
        self.middleware = stages.into_iter().collect();
        self
    }

    /// Validate and freeze the specification.
    pub fn build(self) -> Result<RequestSpec<T>> {
        if let Some(error) = self.error {
            return Err(HttpClientError::Config(error));
        }

        let url = match self.url {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Err(HttpClientError::Config("url must not be blank".to_string())),
        };

        let response_type = self
            .response_type
            .ok_or_else(|| HttpClientError::Config("response type is required".to_string()))?;

        for (name, value) in &self.headers {
            HeaderName::try_from(name.as_str())
                .map_err(|e| HttpClientError::Config(format!("Invalid header name {}: {}", name, e)))?;
            HeaderValue::try_from(value.as_str()).map_err(|e| {
                HttpClientError::Config(format!("Invalid value for header {}: {}", name, e))
            })?;
        }

        for value in [&self.content_type, &self.accept_type].into_iter().flatten() {
            HeaderValue::try_from(value.as_str()).map_err(|e| {
                HttpClientError::Config(format!("Invalid media type {}: {}", value, e))
            })?;
        }

        Ok(RequestSpec {
            url,
            method: self.method,
            headers: self.headers,
            content_type: self.content_type,
            accept_type: self.accept_type,
            body: self.body,
            response_type,
            timeout_ms: self.timeout_ms,
            max_retries: self.max_retries,
            retry_interval_ms: self.retry_interval_ms,
            middleware: self.middleware,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{CorrelationIdMiddleware, RequestLoggingMiddleware};

    fn text_spec() -> RequestSpecBuilder<String> {
        RequestSpec::builder()
            .url("https://example.com/api")
            .response_type(ResponseType::text())
    }

    #[test]
    fn test_builder_with_all_fields() {
        let correlation: Arc<dyn Middleware> = Arc::new(CorrelationIdMiddleware::new());
        let spec = text_spec()
            .method(Method::POST)
            .header("X-Custom", "value")
            .content_type(media_type::APPLICATION_JSON)
            .accept_type(media_type::APPLICATION_JSON)
            .json(&serde_json::json!({"key": "value"}))
            .timeout_ms(5000)
            .max_retries(5)
            .retry_interval_ms(2000)
            .middleware(correlation.clone())
            .build()
            .unwrap();

        assert_eq!(spec.url(), "https://example.com/api");
        assert_eq!(spec.method(), &Method::POST);
        assert_eq!(spec.headers().get("X-Custom").map(String::as_str), Some("value"));
        assert_eq!(spec.content_type(), Some("application/json"));
        assert_eq!(spec.accept_type(), Some("application/json"));
        assert_eq!(
            spec.body(),
            Some(&RequestBody::Json(serde_json::json!({"key": "value"})))
        );
        assert_eq!(spec.response_type().name(), "String");
        assert_eq!(spec.timeout_ms(), Some(5000));
        assert_eq!(spec.timeout(), Some(Duration::from_millis(5000)));
        assert_eq!(spec.max_retries(), Some(5));
        assert_eq!(spec.retry_interval_ms(), Some(2000));
        assert_eq!(spec.middleware().len(), 1);
        assert!(Arc::ptr_eq(&spec.middleware()[0], &correlation));
    }

    #[test]
    fn test_defaults() {
        let spec = text_spec().build().unwrap();

        assert_eq!(spec.method(), &Method::GET);
        assert!(spec.headers().is_empty());
        assert!(spec.content_type().is_none());
        assert!(spec.accept_type().is_none());
        assert!(spec.body().is_none());
        assert!(spec.timeout_ms().is_none());
        assert!(spec.max_retries().is_none());
        assert!(spec.retry_interval_ms().is_none());
        assert!(spec.middleware().is_empty());
    }

    #[test]
    fn test_blank_or_missing_url_is_rejected() {
        for url in ["", "   "] {
            let err = RequestSpec::<String>::builder()
                .url(url)
                .response_type(ResponseType::text())
                .build()
                .unwrap_err();
            assert!(matches!(err, HttpClientError::Config(_)));
        }

        let err = RequestSpec::<String>::builder()
            .response_type(ResponseType::text())
            .build()
            .unwrap_err();
        assert!(matches!(err, HttpClientError::Config(_)));
    }

    #[test]
    fn test_missing_response_type_is_rejected() {
        let err = RequestSpec::<String>::builder()
            .url("https://example.com")
            .build()
            .unwrap_err();
        assert!(matches!(err, HttpClientError::Config(msg) if msg.contains("response type")));
    }

    #[test]
    fn test_invalid_header_is_rejected() {
        let err = text_spec().header("Bad Header", "v").build().unwrap_err();
        assert!(matches!(err, HttpClientError::Config(_)));
    }

    #[test]
    fn test_individual_headers_accumulate() {
        let spec = text_spec()
            .header("X-First", "one")
            .header("X-Second", "two")
            .build()
            .unwrap();

        assert_eq!(spec.headers().len(), 2);
        assert_eq!(spec.headers()["X-First"], "one");
        assert_eq!(spec.headers()["X-Second"], "two");
    }

    #[test]
    fn test_middleware_keeps_declared_order() {
        let first: Arc<dyn Middleware> = Arc::new(RequestLoggingMiddleware::new());
        let second: Arc<dyn Middleware> = Arc::new(CorrelationIdMiddleware::new());
        let spec = text_spec()
            .middlewares([first.clone(), second.clone()])
            .build()
            .unwrap();

        assert!(Arc::ptr_eq(&spec.middleware()[0], &first));
        assert!(Arc::ptr_eq(&spec.middleware()[1], &second));
    }

    #[test]
    fn test_all_methods() {
        for method in [
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::HEAD,
            Method::OPTIONS,
        ] {
            let spec = text_spec().method(method.clone()).build().unwrap();
            assert_eq!(spec.method(), &method);
        }
    }

    #[test]
    fn test_body_encoding() {
        let (bytes, default_ct) = RequestBody::Json(serde_json::json!({"key": "value"}))
            .encode(Some(media_type::APPLICATION_JSON))
            .unwrap();
        assert_eq!(bytes.as_ref(), br#"{"key":"value"}"#);
        assert_eq!(default_ct, Some(media_type::APPLICATION_JSON));

        let (bytes, _) = RequestBody::Json(serde_json::json!({"a": "1", "b": "x y"}))
            .encode(Some(media_type::APPLICATION_FORM_URLENCODED))
            .unwrap();
        assert_eq!(bytes.as_ref(), b"a=1&b=x+y");

        let (bytes, default_ct) = RequestBody::from("hello").encode(None).unwrap();
        assert_eq!(bytes.as_ref(), b"hello");
        assert_eq!(default_ct, Some(media_type::TEXT_PLAIN));

        let (bytes, default_ct) = RequestBody::from(vec![1u8, 2, 3]).encode(None).unwrap();
        assert_eq!(bytes.as_ref(), &[1, 2, 3]);
        assert_eq!(default_ct, None);
    }
}
