//! HTTP middleware

use std::time::Instant;

use axum::extract::Request;
use axum::http::{Method, Uri};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

/// Request logging middleware
///
/// Emits one structured entry per request: method, path, status, latency,
/// remote IP (`CF-Connecting-IP`, set by the fronting proxy), and user agent.
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();

    let remote_ip = header_str(&request, "cf-connecting-ip");
    let user_agent = header_str(&request, "user-agent");

    let response = next.run(request).await;
    let status = response.status().as_u16();
    let duration = start.elapsed();

    if status >= 400 {
        warn!(
            method = %method,
            path = %uri.path(),
            status,
            latency_ms = duration.as_millis(),
            remote_ip,
            user_agent,
            "request completed with error"
        );
    } else {
        info!(
            method = %method,
            path = %uri.path(),
            status,
            latency_ms = duration.as_millis(),
            remote_ip,
            user_agent,
            "request completed"
        );
    }

    response
}

fn header_str(request: &Request, name: &str) -> String {
    request
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("")
        .to_string()
}
