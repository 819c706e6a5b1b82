//! Extraction-and-patch orchestration
//!
//! For one release document:
//! 1. Pick tracks with an audio file and no duration
//! 2. Fetch + probe all of them concurrently, each bounded by a timeout
//! 3. Write back the whole track list in a single patch if anything changed
//!
//! Per-track failures are logged and skipped; only the patch can fail the
//! whole operation.

use futures::future::join_all;
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use super::audio_fetcher::{AudioFetcher, FetchError};
use super::cms_client::{CmsClient, CmsError};
use super::duration_probe::{whole_seconds, DurationProbe, ProbeError};
use crate::models::ReleaseDocument;

/// Why one track could not be measured
#[derive(Debug, Error)]
pub enum TrackError {
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("probe failed: {0}")]
    Probe(#[from] ProbeError),

    #[error("timed out after {0:?}")]
    Timeout(Duration),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackDuration {
    pub key: String,
    pub title: String,
    pub seconds: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrackFailure {
    pub key: String,
    pub error: String,
}

/// Outcome of one extraction-and-patch run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExtractionReport {
    pub updated: Vec<TrackDuration>,
    pub failed: Vec<TrackFailure>,
    /// True if a patch was issued
    pub patched: bool,
}

impl ExtractionReport {
    pub fn is_noop(&self) -> bool {
        !self.patched
    }
}

pub struct DurationExtractor {
    fetcher: Arc<dyn AudioFetcher>,
    probe: Arc<dyn DurationProbe>,
    cms: Arc<dyn CmsClient>,
    track_timeout: Duration,
}

impl DurationExtractor {
    pub fn new(
        fetcher: Arc<dyn AudioFetcher>,
        probe: Arc<dyn DurationProbe>,
        cms: Arc<dyn CmsClient>,
        track_timeout: Duration,
    ) -> Self {
        Self {
            fetcher,
            probe,
            cms,
            track_timeout,
        }
    }

    pub fn cms(&self) -> &Arc<dyn CmsClient> {
        &self.cms
    }

    /// Download and measure one audio file
    ///
    /// The temporary download lives only for the duration of this call.
    pub async fn measure(&self, url: &str) -> Result<u64, TrackError> {
        let measured = async {
            let download = self.fetcher.fetch(url).await?;
            let duration = self.probe.probe(download.path()).await?;
            Ok::<_, TrackError>(whole_seconds(duration))
        };

        tokio::time::timeout(self.track_timeout, measured)
            .await
            .map_err(|_| TrackError::Timeout(self.track_timeout))?
    }

    /// Fill in missing durations and persist them
    pub async fn extract_and_patch(
        &self,
        document: &ReleaseDocument,
    ) -> Result<ExtractionReport, CmsError> {
        let pending: Vec<(usize, String)> = document
            .tracks_needing_duration()
            .filter_map(|(index, track)| track.audio_source().map(|url| (index, url.to_string())))
            .collect();

        if pending.is_empty() {
            tracing::debug!(document_id = %document.id, "No tracks need a duration");
            return Ok(ExtractionReport::default());
        }

        let results = join_all(pending.into_iter().map(|(index, url)| async move {
            let result = self.measure(&url).await;
            (index, result)
        }))
        .await;

        let mut tracks = document.tracks.clone();
        let mut report = ExtractionReport::default();

        for (index, result) in results {
            let track = &mut tracks[index];
            match result {
                Ok(seconds) => {
                    tracing::debug!(
                        document_id = %document.id,
                        track_key = %track.key,
                        seconds,
                        "Measured track duration"
                    );
                    track.duration = Some(seconds);
                    report.updated.push(TrackDuration {
                        key: track.key.clone(),
                        title: track.title.clone(),
                        seconds,
                    });
                }
                Err(e) => {
                    tracing::warn!(
                        document_id = %document.id,
                        track_key = %track.key,
                        error = %e,
                        "Track duration extraction failed, leaving track unchanged"
                    );
                    report.failed.push(TrackFailure {
                        key: track.key.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        if report.updated.is_empty() {
            tracing::warn!(
                document_id = %document.id,
                failed = report.failed.len(),
                "No track durations extracted, skipping patch"
            );
            return Ok(report);
        }

        let tracks_value =
            serde_json::to_value(&tracks).map_err(|e| CmsError::ParseError(e.to_string()))?;
        self.cms
            .patch_set(&document.id, json!({ "tracks": tracks_value }))
            .await?;
        report.patched = true;

        tracing::info!(
            document_id = %document.id,
            updated = report.updated.len(),
            failed = report.failed.len(),
            "Patched track durations"
        );

        Ok(report)
    }
}
