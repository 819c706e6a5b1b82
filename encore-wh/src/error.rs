//! Error types for encore-wh
//!
//! Per-track failures never reach this type; they are recovered inside the
//! extractor. What remains maps onto HTTP status codes for the CMS.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use encore_common::api::SignatureError;
use serde_json::json;
use thiserror::Error;

use crate::models::ValidationError;
use crate::services::cms_client::CmsError;

/// Webhook handling error
#[derive(Debug, Error)]
pub enum WebhookError {
    /// Malformed or incomplete delivery (400)
    #[error("Invalid notification: {0}")]
    Validation(#[from] ValidationError),

    /// Missing or invalid signature (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] SignatureError),

    /// Final patch failed (500)
    #[error("Persistence failed: {0}")]
    Persistence(#[from] CmsError),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, error_code) = match &self {
            WebhookError::Validation(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            WebhookError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            WebhookError::Persistence(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR")
            }
            WebhookError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": self.to_string(),
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, WebhookError>;
