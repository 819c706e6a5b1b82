//! API module for shared HTTP API functionality
//!
//! # Design Principle
//!
//! This module contains ONLY pure functions and shared types. Each service
//! wraps these with framework-specific middleware (Axum, etc.).

pub mod signature;

pub use signature::{
    calculate_signature, signature_header_value, verify_signature, SignatureError,
    TimestampTolerance, SIGNATURE_HEADER,
};
