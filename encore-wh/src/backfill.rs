//! One-off backfill of missing track durations
//!
//! Queries the CMS for published releases that still have tracks with audio
//! but no duration and runs the extractor on each, one document at a time.
//! Bypasses the webhook ledger; intended for operators after an outage or
//! when the service is first deployed.

use serde::Serialize;
use serde_json::Value;

use crate::models::{is_draft_id, ReleaseDocument};
use crate::services::relevance_filter::{pending_work, FilterRules};
use crate::services::{CmsError, DurationExtractor};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BackfillSummary {
    /// Documents returned by the query
    pub candidates: usize,
    /// Documents that had pending tracks after local checks
    pub eligible: usize,
    pub patched: usize,
    pub tracks_updated: usize,
    pub tracks_failed: usize,
    /// Documents whose patch failed
    pub patch_failures: usize,
    /// Query rows that could not be parsed as releases
    pub unparsable: usize,
}

/// Query for published documents of the configured type with pending tracks
pub fn backfill_query(rules: &FilterRules) -> String {
    let mut filters = vec![
        format!("_type == {}", quote(&rules.document_type)),
        "!(_id in path(\"drafts.**\"))".to_string(),
        "!(_id in path(\"versions.**\"))".to_string(),
        "count(tracks[defined(audioFileUrl) && !defined(derivedDuration)]) > 0".to_string(),
    ];
    if let Some(source) = &rules.required_source {
        filters.push(format!("releaseSource == {}", quote(source)));
    }
    format!("*[{}]", filters.join(" && "))
}

fn quote(value: &str) -> String {
    Value::String(value.to_string()).to_string()
}

/// Run the backfill
///
/// With `dry_run` the query and local checks run but nothing is fetched or
/// patched. Patch failures are counted and the run continues; only a failed
/// query aborts.
pub async fn run_backfill(
    extractor: &DurationExtractor,
    rules: &FilterRules,
    dry_run: bool,
) -> Result<BackfillSummary, CmsError> {
    let query = backfill_query(rules);
    tracing::info!(query = %query, dry_run, "Starting duration backfill");

    let rows = extractor.cms().query(&query).await?;
    let mut summary = BackfillSummary {
        candidates: rows.len(),
        ..BackfillSummary::default()
    };

    for row in rows {
        let document = match serde_json::from_value::<ReleaseDocument>(row) {
            Ok(doc) if !doc.id.trim().is_empty() => doc,
            Ok(_) => {
                tracing::warn!("Skipping query row without _id");
                summary.unparsable += 1;
                continue;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Skipping unparsable query row");
                summary.unparsable += 1;
                continue;
            }
        };

        if is_draft_id(&document.id) {
            continue;
        }
        if let Err(reason) = pending_work(&document, rules) {
            tracing::debug!(document_id = %document.id, reason = %reason, "Nothing to backfill");
            continue;
        }
        summary.eligible += 1;

        if dry_run {
            let pending = document.tracks_needing_duration().count();
            tracing::info!(document_id = %document.id, pending, "Would backfill");
            continue;
        }

        match extractor.extract_and_patch(&document).await {
            Ok(report) => {
                summary.tracks_updated += report.updated.len();
                summary.tracks_failed += report.failed.len();
                if report.patched {
                    summary.patched += 1;
                }
            }
            Err(e) => {
                tracing::error!(document_id = %document.id, error = %e, "Backfill patch failed");
                summary.patch_failures += 1;
            }
        }
    }

    tracing::info!(
        candidates = summary.candidates,
        eligible = summary.eligible,
        patched = summary.patched,
        tracks_updated = summary.tracks_updated,
        tracks_failed = summary.tracks_failed,
        patch_failures = summary.patch_failures,
        "Backfill complete"
    );

    Ok(summary)
}
