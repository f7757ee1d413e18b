//! Per-request access log.

use std::time::Instant;

use axum::extract::Request;
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

/// Log method, path, declared body size, status and latency of each request.
///
/// Server errors are logged at `warn`; the error itself is logged where it is
/// mapped to a response.
pub async fn request_logging(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_owned();
    let body_bytes = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok());
    let started = Instant::now();

    let response = next.run(request).await;

    let status = response.status().as_u16();
    let elapsed_ms = started.elapsed().as_millis() as u64;
    if response.status().is_server_error() {
        warn!(%method, path = %path, status, body_bytes, elapsed_ms, "Request failed");
    } else {
        info!(%method, path = %path, status, body_bytes, elapsed_ms, "Request served");
    }

    response
}
