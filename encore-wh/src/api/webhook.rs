//! Webhook receiver
//!
//! `POST /webhooks/release`. Every accepted delivery answers 200, including
//! skips, duplicates and rate-limited notifications, so the CMS does not keep
//! redelivering work that will never run. Only malformed deliveries (400),
//! bad signatures (401) and failed patches (500) surface as errors.

use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde::Serialize;

use crate::error::{ApiResult, WebhookError};
use crate::models::{ChangeNotification, OPERATION_HEADER, TRANSACTION_ID_HEADER};
use crate::services::ProcessingOutcome;
use crate::AppState;

#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub document_id: String,
    pub transaction_id: String,
    #[serde(flatten)]
    pub outcome: ProcessingOutcome,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// POST /webhooks/release
pub async fn receive_release_notification(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<WebhookResponse>> {
    let notification = ChangeNotification::from_delivery(
        header_str(&headers, TRANSACTION_ID_HEADER),
        header_str(&headers, OPERATION_HEADER),
        &body,
    )
    .inspect_err(|e| tracing::warn!(error = %e, "Rejected malformed webhook delivery"))?;

    let outcome = match state.processor.handle(&notification).await {
        Ok(outcome) => outcome,
        Err(e) => {
            record_last_error(&state, &notification, &e).await;
            return Err(e);
        }
    };

    Ok(Json(WebhookResponse {
        document_id: notification.document_id,
        transaction_id: notification.transaction_id,
        outcome,
    }))
}

async fn record_last_error(state: &AppState, notification: &ChangeNotification, error: &WebhookError) {
    let message = format!(
        "{} (document {}, transaction {})",
        error, notification.document_id, notification.transaction_id
    );
    *state.last_error.write().await = Some(message);
}
