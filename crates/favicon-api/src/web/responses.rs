//! HTTP response types
//!
//! Every endpoint answers with the same envelope:
//! `{success, status, value, meta}`. The mapping from classified errors to
//! statuses and externally visible messages lives here; original errors are
//! logged, never returned to the client.

use std::collections::HashMap;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::{AppError, DiscoveryError};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse {
    pub success: bool,
    pub status: u16,
    pub value: serde_json::Value,
    pub meta: HashMap<String, String>,
}

impl ApiResponse {
    pub fn ok(value: impl Into<serde_json::Value>, meta: HashMap<String, String>) -> Self {
        Self {
            success: true,
            status: StatusCode::OK.as_u16(),
            value: value.into(),
            meta,
        }
    }

    pub fn error(status: StatusCode, message: &str) -> Self {
        Self {
            success: false,
            status: status.as_u16(),
            value: message.into(),
            meta: HashMap::new(),
        }
    }
}

impl IntoResponse for ApiResponse {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(self)).into_response()
    }
}

/// Map a classified error to its envelope.
pub fn handle_error(error: AppError) -> ApiResponse {
    match &error {
        AppError::Validation { message } => ApiResponse::error(StatusCode::BAD_REQUEST, message),
        AppError::Discovery(DiscoveryError::UnreachableServer) => {
            ApiResponse::error(StatusCode::BAD_REQUEST, "unreachable server")
        }
        _ => {
            error!(%error, "resolution failed");
            ApiResponse::error(StatusCode::INTERNAL_SERVER_ERROR, "unexpected error")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_envelope_shape() {
        let response = ApiResponse::ok(
            "https://cdn.example.net/favicons/example.com.png",
            HashMap::from([("filled".to_string(), "yes".to_string())]),
        );
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["status"], 200);
        assert_eq!(json["value"], "https://cdn.example.net/favicons/example.com.png");
        assert_eq!(json["meta"]["filled"], "yes");
    }

    #[test]
    fn validation_errors_map_to_bad_request() {
        let response = handle_error(AppError::validation("url field must be a valid url"));
        assert_eq!(response.status, 400);
        assert_eq!(response.value, "url field must be a valid url");
        assert!(!response.success);
    }

    #[test]
    fn unreachable_maps_to_bad_request_with_short_text() {
        let response = handle_error(DiscoveryError::UnreachableServer.into());
        assert_eq!(response.status, 400);
        assert_eq!(response.value, "unreachable server");
    }

    #[test]
    fn internal_detail_is_never_surfaced() {
        let response = handle_error(AppError::internal("s3 exploded: secret details"));
        assert_eq!(response.status, 500);
        assert_eq!(response.value, "unexpected error");
    }
}
