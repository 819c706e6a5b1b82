//! Signature verification middleware
//!
//! Applied to webhook routes only; `/health` and `/api/buildinfo` stay open.

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use encore_common::api::{verify_signature, SIGNATURE_HEADER};
use encore_common::time::now_millis;
use tracing::warn;

use crate::error::WebhookError;
use crate::models::ValidationError;
use crate::AppState;

/// Verify `webhook-signature` against the raw body
///
/// An empty secret disables verification. The body is buffered (bounded by
/// `max_body_bytes`) and handed on unchanged.
pub async fn verify_webhook_signature(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, WebhookError> {
    if state.webhook_secret.is_empty() {
        return Ok(next.run(request).await);
    }

    let (parts, body) = request.into_parts();
    let body_bytes = axum::body::to_bytes(body, state.max_body_bytes)
        .await
        .map_err(|e| ValidationError::MalformedBody(format!("Failed to read body: {}", e)))?;

    let header = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());

    if let Err(e) = verify_signature(
        header,
        &body_bytes,
        &state.webhook_secret,
        now_millis(),
        &state.tolerance,
    ) {
        warn!(uri = %parts.uri, error = %e, "Rejected webhook delivery");
        return Err(WebhookError::Unauthorized(e));
    }

    let request = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(request).await)
}
