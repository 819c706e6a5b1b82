//! Webhook processing services
//!
//! - `relevance_filter`: pure "is this new work?" decision
//! - `ledger`: dedup and retry bounding for accepted deliveries
//! - `document_locks`: per-document serialization
//! - `audio_fetcher` / `duration_probe`: download and measure one track
//! - `cms_client`: query and patch documents
//! - `duration_extractor`: per-document extraction-and-patch
//! - `webhook_processor`: ties the gates and the extractor together

pub mod audio_fetcher;
pub mod cms_client;
pub mod document_locks;
pub mod duration_extractor;
pub mod duration_probe;
pub mod ledger;
pub mod relevance_filter;
pub mod webhook_processor;

pub use audio_fetcher::{AudioFetcher, FetchError, HttpAudioFetcher};
pub use cms_client::{CmsClient, CmsError, HttpCmsClient};
pub use document_locks::{DocumentGuard, DocumentLocks};
pub use duration_extractor::{DurationExtractor, ExtractionReport, TrackDuration, TrackError, TrackFailure};
pub use duration_probe::{DurationProbe, LoftyProbe, ProbeError};
pub use ledger::{LedgerConfig, LedgerDecision, ProcessingLedger};
pub use relevance_filter::{FilterRules, Relevance, SkipReason};
pub use webhook_processor::{ProcessingOutcome, WebhookProcessor};
