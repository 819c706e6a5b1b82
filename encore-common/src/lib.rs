//! # Encore Common Library
//!
//! Shared code for the Encore site services including:
//! - Configuration loading (TOML + environment + compiled defaults)
//! - Webhook signature primitives
//! - Clock abstraction for time-windowed state
//! - Common error type

pub mod api;
pub mod config;
pub mod error;
pub mod time;

pub use error::{Error, Result};
