//! Spans for request lifecycles.
//!
//! Every lifecycle runs inside a span carrying its request id, so transport
//! events logged deeper down correlate with the request that caused them.

use tracing::Span;
use uuid::Uuid;

use crate::http::Method;

/// Fresh request id for a lifecycle.
pub fn request_id() -> Uuid {
    Uuid::new_v4()
}

/// Span wrapping one lifecycle run.
pub fn lifecycle_span(id: &Uuid, method: Method, path: &str) -> Span {
    tracing::debug_span!("request", request_id = %id, method = %method, path = %path)
}
