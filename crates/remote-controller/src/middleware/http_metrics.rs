//! Request metrics for every controller response.
//!
//! Runs outside the router so unknown parties, bad JSON and oversized
//! uploads are counted alongside orchestrated calls.

use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::observability::metrics::record_http_request;

/// Outermost layer; the path is normalized by [`record_http_request`].
pub async fn http_metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    let response = next.run(request).await;

    record_http_request(&method, &path, response.status().as_u16(), start.elapsed());
    response
}
