//! Buffered responses handed to middleware and decoders.

use crate::{HttpClientError, Result};
use bytes::Bytes;
use http::{HeaderMap, StatusCode};
use serde::de::DeserializeOwned;

/// Fully buffered HTTP response.
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
    url: url::Url,
}

impl Response {
    /// Create a response from its parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>, url: url::Url) -> Self {
        Self {
            status,
            headers,
            body: body.into(),
            url,
        }
    }

    /// Buffer a reqwest response.
    pub(crate) async fn from_reqwest(response: reqwest::Response) -> Result<Self> {
        let status = response.status();
        let headers = response.headers().clone();
        let url = response.url().clone();
        let body = response.bytes().await?;

        Ok(Self {
            status,
            headers,
            body,
            url,
        })
    }

    /// Status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Reason phrase of the status code.
    pub fn reason(&self) -> &'static str {
        self.status.canonical_reason().unwrap_or("Unknown")
    }

    /// `true` for any 2xx status.
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Response headers.
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// First value of `name`, if present and visible ASCII.
    pub fn header(&self, name: impl AsRef<str>) -> Option<&str> {
        self.headers
            .get(name.as_ref())
            .and_then(|v| v.to_str().ok())
    }

    /// Final URL of the exchange.
    pub fn url(&self) -> &url::Url {
        &self.url
    }

    /// Raw body.
    pub fn bytes(&self) -> &Bytes {
        &self.body
    }

    /// Body as UTF-8 text.
    pub fn text(&self) -> Result<String> {
        String::from_utf8(self.body.to_vec()).map_err(|e| HttpClientError::Decode(e.to_string()))
    }

    /// Body deserialized from JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| HttpClientError::Decode(e.to_string()))
    }

    /// Convert the response into a status error, keeping every part.
    pub fn into_error(self) -> HttpClientError {
        HttpClientError::from_status(self.status, self.headers, self.body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    fn response(status: u16, body: &'static str) -> Response {
        Response::new(
            StatusCode::from_u16(status).unwrap(),
            HeaderMap::new(),
            body,
            url::Url::parse("https://example.com/api").unwrap(),
        )
    }

    #[test]
    fn test_text_and_json() {
        #[derive(Deserialize)]
        struct Item {
            id: u32,
        }

        assert_eq!(response(200, "hello").text().unwrap(), "hello");
        assert_eq!(response(200, r#"{"id": 7}"#).json::<Item>().unwrap().id, 7);
        assert!(matches!(
            response(200, "not json").json::<Item>(),
            Err(HttpClientError::Decode(_))
        ));
    }

    #[test]
    fn test_into_error() {
        let err = response(503, "down").into_error();
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.body().unwrap().as_ref(), b"down");
        assert_eq!(err.kind_name(), "HttpStatusError");
    }
}
