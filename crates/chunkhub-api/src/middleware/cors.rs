//! Cross-origin access for browser upload clients.

use std::time::Duration;

use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tracing::warn;

use chunkhub_core::config::CorsConfig;

/// CORS layer for the upload API.
///
/// Download responses expose `Content-Disposition` and `Content-Length` so a
/// browser can name the saved file and show progress.
pub fn build_cors_layer(config: &CorsConfig) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(allowed_origins(&config.allowed_origins))
        .allow_methods(
            config
                .allowed_methods
                .iter()
                .filter_map(|m| m.parse::<Method>().ok())
                .collect::<Vec<_>>(),
        )
        .allow_headers(Any)
        .expose_headers([header::CONTENT_DISPOSITION, header::CONTENT_LENGTH])
        .max_age(Duration::from_secs(config.max_age_seconds))
}

fn allowed_origins(origins: &[String]) -> AllowOrigin {
    if origins.iter().any(|o| o == "*") {
        return AllowOrigin::any();
    }
    let parsed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();
    AllowOrigin::list(parsed)
}
