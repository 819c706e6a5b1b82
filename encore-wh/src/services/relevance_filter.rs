//! Change-relevance filter
//!
//! Decides whether a notification describes work that has not been done yet.
//! Pure function over the notification; no I/O, no shared state.
//!
//! Rules, first match wins:
//! 1. Draft or staged ids are never processed
//! 2. `create` is always processed (new documents get one pass)
//! 3. `delete` is never processed
//! 4. Wrong document type or release source is skipped
//! 5. Otherwise processed only if some track has audio but no duration
//!
//! Rule 1 deliberately precedes rule 2: publishing is what triggers side
//! effects, so a freshly created draft waits for its published counterpart.

use encore_common::config::WebhookConfig;
use serde::Serialize;
use std::fmt;

use crate::models::{ChangeNotification, Operation, ReleaseDocument};

/// What this service processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterRules {
    pub document_type: String,
    /// Required release-source discriminator value, `None` accepts any
    pub required_source: Option<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self::from(&WebhookConfig::default())
    }
}

impl From<&WebhookConfig> for FilterRules {
    fn from(config: &WebhookConfig) -> Self {
        Self {
            document_type: config.document_type.clone(),
            required_source: config.required_source.clone(),
        }
    }
}

/// Why a notification was not processed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Draft,
    Deleted,
    WrongType,
    WrongSource,
    NothingToDo,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Draft => "draft",
            SkipReason::Deleted => "deleted",
            SkipReason::WrongType => "wrong_type",
            SkipReason::WrongSource => "wrong_source",
            SkipReason::NothingToDo => "nothing_to_do",
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relevance {
    Eligible,
    Ineligible(SkipReason),
}

/// Evaluate the filter rules for one notification
pub fn evaluate(notification: &ChangeNotification, rules: &FilterRules) -> Relevance {
    if notification.is_draft() {
        return Relevance::Ineligible(SkipReason::Draft);
    }

    match notification.operation {
        Operation::Create => return Relevance::Eligible,
        Operation::Delete => return Relevance::Ineligible(SkipReason::Deleted),
        Operation::Update => {}
    }

    if notification.document_type != rules.document_type {
        return Relevance::Ineligible(SkipReason::WrongType);
    }

    match pending_work(&notification.payload, rules) {
        Ok(()) => Relevance::Eligible,
        Err(reason) => Relevance::Ineligible(reason),
    }
}

pub fn should_process(notification: &ChangeNotification, rules: &FilterRules) -> bool {
    evaluate(notification, rules) == Relevance::Eligible
}

/// Source and track checks shared with the backfill command
pub fn pending_work(document: &ReleaseDocument, rules: &FilterRules) -> Result<(), SkipReason> {
    if let Some(required) = &rules.required_source {
        if document.release_source.as_deref() != Some(required.as_str()) {
            return Err(SkipReason::WrongSource);
        }
    }

    if document.needs_duration() {
        Ok(())
    } else {
        Err(SkipReason::NothingToDo)
    }
}
