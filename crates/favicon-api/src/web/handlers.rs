//! HTTP request handlers
//!
//! Thin handlers that delegate to the resolver service; the envelope and
//! status mapping live in `responses`.

use axum::Json;
use axum::extract::{Path, Query, State};
use axum::http::header::{CACHE_CONTROL, HeaderValue};
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};

use super::AppState;
use super::responses::{ApiResponse, handle_error};

#[derive(Debug, Deserialize)]
pub struct ResolveParams {
    #[serde(rename = "fallbackURL", default)]
    pub fallback_url: String,
}

/// Resolve the favicon for the percent-encoded target URL in the trailing
/// path segment.
pub async fn resolve_favicon(
    State(state): State<AppState>,
    Path(target): Path<String>,
    Query(params): Query<ResolveParams>,
) -> Response {
    let target = target.trim();
    let fallback = params.fallback_url.trim();

    let envelope = match state.resolver.resolve(target, fallback).await {
        Ok(resolution) => ApiResponse::ok(resolution.value, resolution.meta),
        Err(error) => handle_error(error),
    };

    let mut response = envelope.into_response();
    if state.cache_enabled {
        response.headers_mut().insert(
            CACHE_CONTROL,
            HeaderValue::from_static("max-age=604800, immutable"),
        );
    }
    response
}

/// Liveness endpoint.
pub async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "version": crate::SERVICE_VERSION,
    }))
}
