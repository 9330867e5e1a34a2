//! Built-in middleware stages.

mod bearer;
mod correlation;
mod logging;

pub use bearer::BearerTokenMiddleware;
pub use correlation::{CORRELATION_ID_HEADER, CorrelationIdMiddleware};
pub use logging::RequestLoggingMiddleware;
