//! Webhook signature verification via timestamp and SHA-256 hash
//!
//! # Scheme
//!
//! - Each delivery carries a `webhook-signature` header: `t=<unix ms>,v1=<hex>`
//! - `v1` is SHA-256 over `"{t}.{raw body}{secret}"`, as 64 lowercase hex chars
//! - The timestamp must fall inside a tolerance window around the receiver's clock
//! - An empty secret disables verification entirely
//!
//! # Pure Functions
//!
//! This module contains ONLY pure functions. No HTTP framework dependencies;
//! the Axum middleware lives in the service crate.

use sha2::{Digest, Sha256};

/// Signature header name
pub const SIGNATURE_HEADER: &str = "webhook-signature";

// ========================================
// Error Types
// ========================================

/// Signature verification errors
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SignatureError {
    /// Header absent from request
    MissingHeader,

    /// Header present but not `t=<ms>,v1=<hex>`
    MalformedHeader(String),

    /// Timestamp outside acceptable window
    InvalidTimestamp {
        timestamp: i64,
        now: i64,
        reason: String,
    },

    /// Signature does not match calculated value
    InvalidSignature,
}

impl std::fmt::Display for SignatureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SignatureError::MissingHeader => write!(f, "Missing {} header", SIGNATURE_HEADER),
            SignatureError::MalformedHeader(reason) => {
                write!(f, "Malformed signature header: {}", reason)
            }
            SignatureError::InvalidTimestamp { reason, .. } => {
                write!(f, "Invalid timestamp: {}", reason)
            }
            SignatureError::InvalidSignature => write!(f, "Invalid signature"),
        }
    }
}

impl std::error::Error for SignatureError {}

// ========================================
// Header Parsing
// ========================================

/// Parsed `webhook-signature` header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    /// Unix epoch milliseconds chosen by the sender
    pub timestamp: i64,
    /// Hex-encoded SHA-256 signature
    pub signature: String,
}

/// Parse `t=<ms>,v1=<hex>` (order-insensitive, surrounding whitespace ignored)
///
/// # Examples
///
/// ```
/// use encore_common::api::signature::parse_signature_header;
///
/// let parsed = parse_signature_header("t=1730000000000,v1=abc123").unwrap();
/// assert_eq!(parsed.timestamp, 1730000000000);
/// assert_eq!(parsed.signature, "abc123");
/// ```
pub fn parse_signature_header(header: &str) -> Result<SignatureHeader, SignatureError> {
    let mut timestamp = None;
    let mut signature = None;

    for part in header.split(',') {
        let (name, value) = part
            .trim()
            .split_once('=')
            .ok_or_else(|| SignatureError::MalformedHeader(format!("bad segment '{}'", part)))?;

        match name {
            "t" => {
                let parsed = value.parse::<i64>().map_err(|e| {
                    SignatureError::MalformedHeader(format!("bad timestamp: {}", e))
                })?;
                timestamp = Some(parsed);
            }
            "v1" => signature = Some(value.to_string()),
            // Unknown schemes are ignored so senders can add v2 alongside v1
            _ => {}
        }
    }

    match (timestamp, signature) {
        (Some(timestamp), Some(signature)) if !signature.is_empty() => {
            Ok(SignatureHeader { timestamp, signature })
        }
        (None, _) => Err(SignatureError::MalformedHeader("missing t".to_string())),
        _ => Err(SignatureError::MalformedHeader("missing v1".to_string())),
    }
}

// ========================================
// Timestamp Validation
// ========================================

/// Accepted clock skew for signature timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampTolerance {
    /// Maximum age in milliseconds (delivery queues can hold messages)
    pub max_past_ms: i64,
    /// Maximum lead in milliseconds (clock drift only)
    pub max_future_ms: i64,
}

impl Default for TimestampTolerance {
    fn default() -> Self {
        Self {
            max_past_ms: 300_000,
            max_future_ms: 5_000,
        }
    }
}

/// Validate timestamp against `now` (both Unix epoch ms)
///
/// # Examples
///
/// ```
/// use encore_common::api::signature::{validate_timestamp, TimestampTolerance};
///
/// let tolerance = TimestampTolerance::default();
/// let now = 1_730_000_000_000;
///
/// assert!(validate_timestamp(now - 1_000, now, &tolerance).is_ok());
/// assert!(validate_timestamp(now - 600_000, now, &tolerance).is_err());
/// ```
pub fn validate_timestamp(
    timestamp: i64,
    now: i64,
    tolerance: &TimestampTolerance,
) -> Result<(), SignatureError> {
    let Some(diff) = now.checked_sub(timestamp) else {
        return Err(SignatureError::InvalidTimestamp {
            timestamp,
            now,
            reason: "Timestamp out of range".to_string(),
        });
    };

    if diff > tolerance.max_past_ms {
        return Err(SignatureError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms too old (max {}ms past)",
                diff, tolerance.max_past_ms
            ),
        });
    }

    if diff < tolerance.max_future_ms.saturating_neg() {
        return Err(SignatureError::InvalidTimestamp {
            timestamp,
            now,
            reason: format!(
                "Timestamp {}ms in future (max {}ms future)",
                diff.unsigned_abs(),
                tolerance.max_future_ms
            ),
        });
    }

    Ok(())
}

// ========================================
// Signature Calculation and Validation
// ========================================

/// Calculate signature for a raw body
///
/// # Algorithm
///
/// 1. Concatenate timestamp, `.`, raw body bytes, secret bytes
/// 2. SHA-256 the result
/// 3. Return as 64 hex characters
///
/// # Examples
///
/// ```
/// use encore_common::api::signature::calculate_signature;
///
/// let sig = calculate_signature(1730000000000, br#"{"_id":"release-1"}"#, "s3cret");
/// assert_eq!(sig.len(), 64);
/// ```
pub fn calculate_signature(timestamp: i64, body: &[u8], secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(timestamp.to_string().as_bytes());
    hasher.update(b".");
    hasher.update(body);
    hasher.update(secret.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Build a header value for a body (used by senders and tests)
pub fn signature_header_value(timestamp: i64, body: &[u8], secret: &str) -> String {
    format!("t={},v1={}", timestamp, calculate_signature(timestamp, body, secret))
}

/// Verify a delivery
///
/// `header` is the raw header value, `None` when the header was absent.
pub fn verify_signature(
    header: Option<&str>,
    body: &[u8],
    secret: &str,
    now: i64,
    tolerance: &TimestampTolerance,
) -> Result<(), SignatureError> {
    let header = header.ok_or(SignatureError::MissingHeader)?;
    let parsed = parse_signature_header(header)?;

    validate_timestamp(parsed.timestamp, now, tolerance)?;

    let calculated = calculate_signature(parsed.timestamp, body, secret);
    if !constant_time_eq(parsed.signature.as_bytes(), calculated.as_bytes()) {
        return Err(SignatureError::InvalidSignature);
    }

    Ok(())
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ========================================
// Tests
// ========================================
