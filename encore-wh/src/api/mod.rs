//! HTTP API handlers for encore-wh

pub mod buildinfo;
pub mod health;
pub mod signature;
pub mod webhook;

pub use buildinfo::buildinfo_routes;
pub use health::health_routes;
pub use signature::verify_webhook_signature;
pub use webhook::{receive_release_notification, WebhookResponse};
