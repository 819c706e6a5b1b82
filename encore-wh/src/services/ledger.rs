//! Dedup / retry-bound ledger
//!
//! Process-local record of accepted deliveries. Two independent windows:
//!
//! - **expiry** (default 30 s): how long a `(document, transaction)` key is
//!   remembered. A redelivery of the same key inside this window is a
//!   duplicate.
//! - **retry window** (default 5 min): sliding window over which accepted
//!   attempts are counted per document. Once `max_retries` attempts fall
//!   inside it, further notifications for the document are refused until
//!   the oldest ages out.
//!
//! Nothing is persisted; a restart forgets everything. The ledger itself is
//! not synchronized: callers hold it behind a mutex and use [`ProcessingLedger::try_accept`]
//! so the check and the insert happen under one lock.

use chrono::{DateTime, Duration, Utc};
use encore_common::config::{LedgerSettings, MAX_LEDGER_WINDOW_SECS};
use std::collections::{HashMap, VecDeque};
use std::fmt;

/// Ledger windows and limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LedgerConfig {
    pub retry_window: Duration,
    pub max_retries: usize,
    pub expiry: Duration,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self::from(&LedgerSettings::default())
    }
}

impl From<&LedgerSettings> for LedgerConfig {
    /// Windows are clamped to [`MAX_LEDGER_WINDOW_SECS`]
    fn from(settings: &LedgerSettings) -> Self {
        Self {
            retry_window: window(settings.retry_window_secs),
            max_retries: settings.max_retries,
            expiry: window(settings.expiry_secs),
        }
    }
}

fn window(secs: u64) -> Duration {
    // Clamped value fits in i64 and in chrono's range
    Duration::seconds(secs.min(MAX_LEDGER_WINDOW_SECS) as i64)
}

/// Identifies one delivery
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AttemptKey {
    pub document_id: String,
    pub transaction_id: String,
}

impl AttemptKey {
    pub fn new(document_id: &str, transaction_id: &str) -> Self {
        Self {
            document_id: document_id.to_string(),
            transaction_id: transaction_id.to_string(),
        }
    }
}

impl fmt::Display for AttemptKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.document_id, self.transaction_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LedgerDecision {
    Accept,
    /// Same `(document, transaction)` seen within the expiry window
    Duplicate,
    /// Document already has `attempts` attempts inside the retry window
    RetryLimit { attempts: usize },
}

#[derive(Debug, Default)]
pub struct ProcessingLedger {
    config: LedgerConfig,
    entries: HashMap<AttemptKey, DateTime<Utc>>,
    attempts: HashMap<String, VecDeque<DateTime<Utc>>>,
}

impl ProcessingLedger {
    pub fn new(config: LedgerConfig) -> Self {
        Self {
            config,
            entries: HashMap::new(),
            attempts: HashMap::new(),
        }
    }

    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }

    /// Decide whether a delivery may start processing
    ///
    /// Sweeps expired state first, then checks the per-document retry bound
    /// before the exact-key duplicate check.
    pub fn can_accept(
        &mut self,
        document_id: &str,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> LedgerDecision {
        self.sweep(now);

        let attempts = self.attempts_within_window(document_id, now);
        if attempts >= self.config.max_retries {
            return LedgerDecision::RetryLimit { attempts };
        }

        if self
            .entries
            .contains_key(&AttemptKey::new(document_id, transaction_id))
        {
            return LedgerDecision::Duplicate;
        }

        LedgerDecision::Accept
    }

    /// Record an accepted delivery; call once, before processing starts
    pub fn record(&mut self, document_id: &str, transaction_id: &str, now: DateTime<Utc>) {
        self.entries
            .insert(AttemptKey::new(document_id, transaction_id), now);
        self.attempts
            .entry(document_id.to_string())
            .or_default()
            .push_back(now);
    }

    /// `can_accept` followed by `record` when accepted
    pub fn try_accept(
        &mut self,
        document_id: &str,
        transaction_id: &str,
        now: DateTime<Utc>,
    ) -> LedgerDecision {
        let decision = self.can_accept(document_id, transaction_id, now);
        if decision == LedgerDecision::Accept {
            self.record(document_id, transaction_id, now);
        }
        decision
    }

    /// Drop keys past the expiry window and attempts past the retry window
    pub fn sweep(&mut self, now: DateTime<Utc>) {
        let expiry = self.config.expiry;
        self.entries.retain(|_, recorded| now - *recorded < expiry);

        let window = self.config.retry_window;
        self.attempts.retain(|_, history| {
            while history.front().is_some_and(|t| now - *t >= window) {
                history.pop_front();
            }
            !history.is_empty()
        });
    }

    /// Attempts recorded for the document inside the retry window
    pub fn attempts_within_window(&self, document_id: &str, now: DateTime<Utc>) -> usize {
        self.attempts.get(document_id).map_or(0, |history| {
            history
                .iter()
                .filter(|t| now - **t < self.config.retry_window)
                .count()
        })
    }

    /// Number of live dedup keys
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
