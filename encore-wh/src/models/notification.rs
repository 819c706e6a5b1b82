//! Inbound change notification
//!
//! A notification is assembled from one webhook delivery: the document
//! snapshot comes from the body, the transaction id and operation from
//! transport headers.

use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use super::document::{is_draft_id, ReleaseDocument};

pub const TRANSACTION_ID_HEADER: &str = "webhook-transaction-id";
pub const OPERATION_HEADER: &str = "webhook-operation";

/// Malformed or incomplete delivery
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Missing header: {0}")]
    MissingHeader(&'static str),

    #[error("Unknown operation: {0}")]
    UnknownOperation(String),

    #[error("Malformed body: {0}")]
    MalformedBody(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),
}

/// Kind of change the CMS reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Create,
    Update,
    Delete,
}

impl FromStr for Operation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "create" => Ok(Operation::Create),
            "update" => Ok(Operation::Update),
            "delete" => Ok(Operation::Delete),
            other => Err(ValidationError::UnknownOperation(other.to_string())),
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// One content-change delivery
#[derive(Debug, Clone, PartialEq)]
pub struct ChangeNotification {
    pub document_id: String,
    pub document_type: String,
    pub operation: Operation,
    pub transaction_id: String,
    pub payload: ReleaseDocument,
}

impl ChangeNotification {
    pub fn new(operation: Operation, transaction_id: impl Into<String>, payload: ReleaseDocument) -> Self {
        Self {
            document_id: payload.id.clone(),
            document_type: payload.doc_type.clone(),
            operation,
            transaction_id: transaction_id.into(),
            payload,
        }
    }

    /// Build a notification from raw delivery parts
    ///
    /// Header values are `None` when the header was absent.
    pub fn from_delivery(
        transaction_id: Option<&str>,
        operation: Option<&str>,
        body: &[u8],
    ) -> Result<Self, ValidationError> {
        let transaction_id = transaction_id
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .ok_or(ValidationError::MissingHeader(TRANSACTION_ID_HEADER))?;

        let operation: Operation = operation
            .ok_or(ValidationError::MissingHeader(OPERATION_HEADER))?
            .parse()?;

        let payload: ReleaseDocument = serde_json::from_slice(body)
            .map_err(|e| ValidationError::MalformedBody(e.to_string()))?;

        if payload.id.trim().is_empty() {
            return Err(ValidationError::MissingField("_id"));
        }
        if payload.doc_type.trim().is_empty() {
            return Err(ValidationError::MissingField("_type"));
        }

        Ok(Self::new(operation, transaction_id, payload))
    }

    pub fn is_draft(&self) -> bool {
        is_draft_id(&self.document_id)
    }
}
