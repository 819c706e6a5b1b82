//! Audio duration probing
//!
//! Uses lofty to read stream properties; the container is detected from
//! content first and the file extension second.

use async_trait::async_trait;
use lofty::prelude::*;
use lofty::probe::Probe;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Duration probe errors
#[derive(Debug, Error)]
pub enum ProbeError {
    /// File could not be opened or parsed
    #[error("Failed to read audio: {0}")]
    ReadError(String),

    /// Container not recognized
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Parsed, but the stream reports no length
    #[error("Audio reports zero duration")]
    NoDuration,

    #[error("Probe task failed: {0}")]
    TaskFailed(String),
}

/// Measures the playing time of a local audio file
#[async_trait]
pub trait DurationProbe: Send + Sync {
    async fn probe(&self, path: &Path) -> Result<Duration, ProbeError>;
}

/// lofty-backed probe
#[derive(Debug, Clone, Copy, Default)]
pub struct LoftyProbe;

impl LoftyProbe {
    pub fn new() -> Self {
        Self
    }

    /// Blocking probe; runs on the blocking pool from [`DurationProbe::probe`]
    pub fn probe_blocking(path: &Path) -> Result<Duration, ProbeError> {
        let probe = Probe::open(path)
            .map_err(|e| ProbeError::ReadError(e.to_string()))?
            .guess_file_type()
            .map_err(|e| ProbeError::ReadError(e.to_string()))?;

        if probe.file_type().is_none() {
            return Err(ProbeError::UnsupportedFormat(path.display().to_string()));
        }

        let tagged_file = probe
            .read()
            .map_err(|e| ProbeError::ReadError(e.to_string()))?;

        let duration = tagged_file.properties().duration();
        if duration.is_zero() {
            return Err(ProbeError::NoDuration);
        }

        tracing::debug!(
            file = %path.display(),
            file_type = ?tagged_file.file_type(),
            duration_s = duration.as_secs_f64(),
            "Probed audio duration"
        );

        Ok(duration)
    }
}

#[async_trait]
impl DurationProbe for LoftyProbe {
    async fn probe(&self, path: &Path) -> Result<Duration, ProbeError> {
        let path: PathBuf = path.to_path_buf();
        tokio::task::spawn_blocking(move || Self::probe_blocking(&path))
            .await
            .map_err(|e| ProbeError::TaskFailed(e.to_string()))?
    }
}

/// Whole seconds, rounded half away from zero
pub fn whole_seconds(duration: Duration) -> u64 {
    duration.as_secs_f64().round() as u64
}
