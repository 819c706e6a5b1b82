//! Audio resource download
//!
//! Downloads a track's audio file into a scoped temporary file. The
//! [`NamedTempFile`] deletes itself when dropped, so callers get cleanup on
//! success, error, timeout and cancellation alike.

use async_trait::async_trait;
use std::time::Duration;
use tempfile::NamedTempFile;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

use crate::utils::{retry_with_backoff, BackoffPolicy, Transient};

const USER_AGENT: &str = concat!("encore-wh/", env!("CARGO_PKG_VERSION"));

/// Audio fetch errors
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP status {0}")]
    Status(u16),

    #[error("Audio file exceeds {limit} bytes")]
    TooLarge { limit: u64 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Transient for FetchError {
    fn is_transient(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Status(code) => *code == 429 || *code >= 500,
            _ => false,
        }
    }
}

/// Downloads audio to a local temporary file
#[async_trait]
pub trait AudioFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<NamedTempFile, FetchError>;
}

/// reqwest-backed fetcher with bounded retries
pub struct HttpAudioFetcher {
    http_client: reqwest::Client,
    max_bytes: u64,
    backoff: BackoffPolicy,
}

impl HttpAudioFetcher {
    pub fn new(max_bytes: u64, backoff: BackoffPolicy) -> Result<Self, FetchError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| FetchError::Network(e.to_string()))?;

        Ok(Self {
            http_client,
            max_bytes,
            backoff,
        })
    }

    async fn fetch_once(&self, url: &reqwest::Url) -> Result<NamedTempFile, FetchError> {
        let mut response = self
            .http_client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status(status.as_u16()));
        }

        if response.content_length().is_some_and(|len| len > self.max_bytes) {
            return Err(FetchError::TooLarge {
                limit: self.max_bytes,
            });
        }

        let temp = tempfile::Builder::new()
            .prefix("encore-audio-")
            .suffix(&extension_suffix(url))
            .tempfile()?;
        let mut out = tokio::fs::File::from_std(temp.reopen()?);

        let mut written: u64 = 0;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
        {
            written += chunk.len() as u64;
            if written > self.max_bytes {
                return Err(FetchError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            out.write_all(&chunk).await?;
        }
        out.flush().await?;

        tracing::debug!(url = %url, bytes = written, "Downloaded audio");
        Ok(temp)
    }
}

#[async_trait]
impl AudioFetcher for HttpAudioFetcher {
    async fn fetch(&self, url: &str) -> Result<NamedTempFile, FetchError> {
        let parsed =
            reqwest::Url::parse(url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(FetchError::InvalidUrl(format!("unsupported scheme in {}", url)));
        }

        retry_with_backoff("audio fetch", &self.backoff, || self.fetch_once(&parsed)).await
    }
}

/// Keep the URL's file extension so format detection has a hint
fn extension_suffix(url: &reqwest::Url) -> String {
    url.path_segments()
        .and_then(|mut segments| segments.next_back())
        .and_then(|name| name.rsplit_once('.'))
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .map(|ext| format!(".{}", ext.to_ascii_lowercase()))
        .unwrap_or_default()
}
