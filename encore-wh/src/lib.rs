//! encore-wh library interface
//!
//! CMS webhook service that fills in derived track durations on release
//! documents. Exposes the router and the processing services for the binary
//! and for integration tests.

pub mod api;
pub mod backfill;
pub mod error;
pub mod models;
pub mod services;
pub mod utils;

pub use crate::error::{ApiResult, WebhookError};

use axum::extract::DefaultBodyLimit;
use axum::Router;
use chrono::{DateTime, Utc};
use encore_common::api::TimestampTolerance;
use encore_common::config::ServiceConfig;
use encore_common::time::Clock;
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::trace::TraceLayer;

use crate::services::{
    DurationExtractor, FilterRules, HttpAudioFetcher, HttpCmsClient, LedgerConfig, LoftyProbe,
    WebhookProcessor,
};
use crate::utils::BackoffPolicy;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub processor: Arc<WebhookProcessor>,
    /// Signing secret; empty disables verification
    pub webhook_secret: Arc<str>,
    pub tolerance: TimestampTolerance,
    pub max_body_bytes: usize,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
    /// Last processing error for diagnostics
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(processor: Arc<WebhookProcessor>, config: &ServiceConfig) -> Self {
        Self {
            processor,
            webhook_secret: Arc::from(config.webhook.secret.as_str()),
            tolerance: config.webhook.tolerance(),
            max_body_bytes: config.server.max_body_bytes,
            startup_time: Utc::now(),
            last_error: Arc::new(RwLock::new(None)),
        }
    }
}

/// Build the production extractor (HTTP fetch, lofty probe, HTTP CMS)
pub fn build_extractor(config: &ServiceConfig) -> encore_common::Result<DurationExtractor> {
    let fetcher = HttpAudioFetcher::new(
        config.extraction.max_audio_bytes,
        BackoffPolicy::with_attempts(config.extraction.fetch_retries),
    )
    .map_err(|e| encore_common::Error::Internal(format!("audio fetcher: {}", e)))?;

    let cms = HttpCmsClient::new(&config.cms)
        .map_err(|e| encore_common::Error::Internal(format!("CMS client: {}", e)))?;

    Ok(DurationExtractor::new(
        Arc::new(fetcher),
        Arc::new(LoftyProbe::new()),
        Arc::new(cms),
        config.extraction.track_timeout(),
    ))
}

/// Build the processor from configuration and a clock
pub fn build_processor(
    config: &ServiceConfig,
    clock: Arc<dyn Clock>,
) -> encore_common::Result<WebhookProcessor> {
    Ok(WebhookProcessor::new(
        FilterRules::from(&config.webhook),
        LedgerConfig::from(&config.ledger),
        clock,
        build_extractor(config)?,
    ))
}

/// Build application router
///
/// Webhook routes require a valid signature; health and build info do not.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;
    use axum::routing::post;

    let webhooks = Router::new()
        .route(
            "/webhooks/release",
            post(api::receive_release_notification),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::verify_webhook_signature,
        ))
        .layer(DefaultBodyLimit::max(state.max_body_bytes));

    Router::new()
        .merge(webhooks)
        .merge(api::health_routes())
        .merge(api::buildinfo_routes())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Unhandled panics answer 500 with the usual error body
fn panic_response(panic: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    use axum::response::IntoResponse;

    let detail = if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else {
        "unknown panic".to_string()
    };

    tracing::error!(panic = %detail, "Request handler panicked");
    WebhookError::Internal(detail).into_response()
}
