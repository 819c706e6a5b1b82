//! Shared test helpers
//!
//! In-memory stand-ins for the CMS, the audio fetcher and the probe, plus
//! builders for release documents.

#![allow(dead_code)]

pub mod audio_generator;

use async_trait::async_trait;
use encore_common::time::ManualClock;
use encore_wh::models::{ReleaseDocument, Track};
use encore_wh::services::{
    AudioFetcher, CmsClient, CmsError, DurationExtractor, DurationProbe, FetchError, FilterRules,
    LedgerConfig, ProbeError, WebhookProcessor,
};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::NamedTempFile;

/// How the fake audio host answers for one URL
#[derive(Debug, Clone)]
pub enum FakeTrack {
    /// Fetch and probe succeed with this many seconds
    Seconds(f64),
    /// Fetch fails with this HTTP status
    FetchStatus(u16),
    /// Fetch succeeds, probe rejects the file
    Corrupt,
    /// Fetch never completes
    Hang,
}

/// Fake fetcher + probe sharing one URL table
///
/// The fetcher writes the URL into the temp file; the probe reads it back to
/// find the configured answer.
#[derive(Default)]
pub struct FakeAudio {
    tracks: Mutex<HashMap<String, FakeTrack>>,
    fetched_paths: Mutex<Vec<PathBuf>>,
    fetch_calls: AtomicUsize,
}

impl FakeAudio {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with(self: Arc<Self>, url: &str, track: FakeTrack) -> Arc<Self> {
        self.tracks.lock().unwrap().insert(url.to_string(), track);
        self
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    /// Temp files handed out so far
    pub fn fetched_paths(&self) -> Vec<PathBuf> {
        self.fetched_paths.lock().unwrap().clone()
    }

    fn lookup(&self, url: &str) -> Option<FakeTrack> {
        self.tracks.lock().unwrap().get(url).cloned()
    }
}

#[async_trait]
impl AudioFetcher for FakeAudio {
    async fn fetch(&self, url: &str) -> Result<NamedTempFile, FetchError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        match self.lookup(url) {
            None => Err(FetchError::Status(404)),
            Some(FakeTrack::FetchStatus(code)) => Err(FetchError::Status(code)),
            Some(FakeTrack::Hang) => {
                std::future::pending::<()>().await;
                unreachable!()
            }
            Some(_) => {
                let mut file = NamedTempFile::new()?;
                file.write_all(url.as_bytes())?;
                self.fetched_paths
                    .lock()
                    .unwrap()
                    .push(file.path().to_path_buf());
                Ok(file)
            }
        }
    }
}

#[async_trait]
impl DurationProbe for FakeAudio {
    async fn probe(&self, path: &Path) -> Result<Duration, ProbeError> {
        let url = std::fs::read_to_string(path).map_err(|e| ProbeError::ReadError(e.to_string()))?;
        match self.lookup(&url) {
            Some(FakeTrack::Seconds(secs)) => Ok(Duration::from_secs_f64(secs)),
            _ => Err(ProbeError::UnsupportedFormat(url)),
        }
    }
}

/// Fake CMS recording every patch
#[derive(Default)]
pub struct FakeCms {
    patches: Mutex<Vec<(String, Value)>>,
    query_rows: Mutex<Vec<Value>>,
    queries: Mutex<Vec<String>>,
    fail_patches: AtomicBool,
    panic_on_patch: AtomicBool,
}

impl FakeCms {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn failing() -> Arc<Self> {
        let cms = Self::default();
        cms.fail_patches.store(true, Ordering::SeqCst);
        Arc::new(cms)
    }

    /// Patches panic instead of returning
    pub fn panicking() -> Arc<Self> {
        let cms = Self::default();
        cms.panic_on_patch.store(true, Ordering::SeqCst);
        Arc::new(cms)
    }

    pub fn set_query_rows(&self, rows: Vec<Value>) {
        *self.query_rows.lock().unwrap() = rows;
    }

    pub fn set_failing(&self, failing: bool) {
        self.fail_patches.store(failing, Ordering::SeqCst);
    }

    pub fn patches(&self) -> Vec<(String, Value)> {
        self.patches.lock().unwrap().clone()
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }

    /// Track list from the most recent patch
    pub fn last_patched_tracks(&self) -> Vec<Value> {
        self.patches()
            .last()
            .and_then(|(_, set)| set["tracks"].as_array().cloned())
            .unwrap_or_default()
    }
}

#[async_trait]
impl CmsClient for FakeCms {
    async fn query(&self, query: &str) -> Result<Vec<Value>, CmsError> {
        self.queries.lock().unwrap().push(query.to_string());
        Ok(self.query_rows.lock().unwrap().clone())
    }

    async fn patch_set(&self, document_id: &str, set: Value) -> Result<(), CmsError> {
        if self.panic_on_patch.load(Ordering::SeqCst) {
            panic!("patch handler exploded for {}", document_id);
        }
        if self.fail_patches.load(Ordering::SeqCst) {
            return Err(CmsError::ApiError(503, "mutation rejected".to_string()));
        }
        self.patches
            .lock()
            .unwrap()
            .push((document_id.to_string(), set));
        Ok(())
    }
}

pub fn track(key: &str, url: Option<&str>, duration: Option<u64>) -> Track {
    Track {
        key: key.to_string(),
        title: key.to_uppercase(),
        audio_file_url: url.map(str::to_string),
        duration,
        extra: Map::new(),
    }
}

pub fn release(id: &str, tracks: Vec<Track>) -> ReleaseDocument {
    ReleaseDocument {
        id: id.to_string(),
        doc_type: "release".to_string(),
        release_source: Some("upload".to_string()),
        tracks,
        extra: Map::new(),
    }
}

pub fn extractor(audio: &Arc<FakeAudio>, cms: &Arc<FakeCms>, timeout: Duration) -> DurationExtractor {
    DurationExtractor::new(audio.clone(), audio.clone(), cms.clone(), timeout)
}

pub fn processor(audio: &Arc<FakeAudio>, cms: &Arc<FakeCms>, clock: &ManualClock) -> WebhookProcessor {
    WebhookProcessor::new(
        FilterRules::default(),
        LedgerConfig::default(),
        Arc::new(clock.clone()),
        extractor(audio, cms, Duration::from_secs(5)),
    )
}
