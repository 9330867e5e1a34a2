// webclient - Outbound HTTP client for service-to-service calls
//
// This library bundles retry with exponential backoff, total timeouts,
// mutual TLS, bearer tokens and correlation ids behind one request
// specification, for async and blocking callers alike.

// Re-export the client crate
pub use webclient_http::*;
