//! Webhook processor
//!
//! Per notification:
//! `received → filtered → ledger-checked → recorded → processing → patch-or-noop → done`
//!
//! The filter and the ledger are gates: a rejection at either ends handling
//! with a successful no-op. The filter runs first, so a redelivery that no
//! longer has pending tracks is skipped without touching the ledger; the
//! result (200, no mutation) is the same as checking the ledger first. The ledger is recorded before any work starts so
//! concurrent redeliveries of the same transaction are refused while the
//! first is still running. Work on a single document is serialized through
//! [`DocumentLocks`].

use encore_common::time::Clock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::document_locks::DocumentLocks;
use super::duration_extractor::{DurationExtractor, ExtractionReport};
use super::ledger::{LedgerConfig, LedgerDecision, ProcessingLedger};
use super::relevance_filter::{self, FilterRules, Relevance, SkipReason};
use crate::error::WebhookError;
use crate::models::ChangeNotification;

/// Terminal state of one handled notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ProcessingOutcome {
    /// Rejected by the relevance filter
    Skipped { reason: SkipReason },
    /// Same transaction already accepted recently
    Duplicate,
    /// Document exhausted its attempts for the retry window
    RateLimited { attempts: usize },
    /// Extraction ran (possibly as a no-op)
    Processed { report: ExtractionReport },
}

pub struct WebhookProcessor {
    rules: FilterRules,
    ledger: Mutex<ProcessingLedger>,
    clock: Arc<dyn Clock>,
    locks: DocumentLocks,
    extractor: DurationExtractor,
}

impl WebhookProcessor {
    pub fn new(
        rules: FilterRules,
        ledger_config: LedgerConfig,
        clock: Arc<dyn Clock>,
        extractor: DurationExtractor,
    ) -> Self {
        Self {
            rules,
            ledger: Mutex::new(ProcessingLedger::new(ledger_config)),
            clock,
            locks: DocumentLocks::new(),
            extractor,
        }
    }

    pub fn rules(&self) -> &FilterRules {
        &self.rules
    }

    pub fn extractor(&self) -> &DurationExtractor {
        &self.extractor
    }

    /// Live dedup entries, after sweeping
    pub async fn ledger_entries(&self) -> usize {
        let mut ledger = self.ledger.lock().await;
        ledger.sweep(self.clock.now());
        ledger.len()
    }

    /// Handle one notification end to end
    pub async fn handle(
        &self,
        notification: &ChangeNotification,
    ) -> Result<ProcessingOutcome, WebhookError> {
        let document_id = notification.document_id.as_str();
        let transaction_id = notification.transaction_id.as_str();

        if let Relevance::Ineligible(reason) = relevance_filter::evaluate(notification, &self.rules)
        {
            tracing::info!(
                document_id,
                transaction_id,
                operation = %notification.operation,
                reason = %reason,
                "Notification not relevant, skipping"
            );
            return Ok(ProcessingOutcome::Skipped { reason });
        }

        let decision = {
            let mut ledger = self.ledger.lock().await;
            ledger.try_accept(document_id, transaction_id, self.clock.now())
        };

        match decision {
            LedgerDecision::Accept => {}
            LedgerDecision::Duplicate => {
                tracing::info!(
                    document_id,
                    transaction_id,
                    "Duplicate delivery, already accepted"
                );
                return Ok(ProcessingOutcome::Duplicate);
            }
            LedgerDecision::RetryLimit { attempts } => {
                tracing::warn!(
                    document_id,
                    transaction_id,
                    attempts,
                    "Retry limit reached for document, rejecting notification"
                );
                return Ok(ProcessingOutcome::RateLimited { attempts });
            }
        }

        let _guard = self.locks.acquire(document_id).await;

        tracing::info!(
            document_id,
            transaction_id,
            operation = %notification.operation,
            "Processing notification"
        );

        match self.extractor.extract_and_patch(&notification.payload).await {
            Ok(report) => {
                if !report.failed.is_empty() {
                    tracing::warn!(
                        document_id,
                        transaction_id,
                        updated = report.updated.len(),
                        failed = report.failed.len(),
                        failed_tracks = ?report.failed.iter().map(|f| f.key.as_str()).collect::<Vec<_>>(),
                        "Some tracks could not be measured"
                    );
                }
                Ok(ProcessingOutcome::Processed { report })
            }
            Err(e) => {
                tracing::error!(
                    document_id,
                    transaction_id,
                    error = %e,
                    "Failed to persist track durations"
                );
                Err(WebhookError::Persistence(e))
            }
        }
    }
}
