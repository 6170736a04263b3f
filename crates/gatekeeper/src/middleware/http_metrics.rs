//! HTTP metrics middleware for capturing all request/response metrics
//!
//! Applied as the outermost layer, so it also sees framework-level errors
//! (404, 405) and the gate's own 401/403 responses.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Middleware that records method, normalized path, status and duration for
/// every response.
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());

    response
}
