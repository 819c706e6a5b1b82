//! Release document snapshot as delivered by the CMS
//!
//! Field names follow the CMS schema (`_id`, `trackTitle`, ...). Fields this
//! service does not understand are kept in `extra` so that the track list can
//! be written back whole without dropping anything an editor entered.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// Id prefixes the CMS uses for unpublished variants
pub const DRAFT_PREFIXES: [&str; 2] = ["drafts.", "versions."];

/// True if the id names a draft or staged version of a document
pub fn is_draft_id(document_id: &str) -> bool {
    DRAFT_PREFIXES
        .iter()
        .any(|prefix| document_id.starts_with(prefix))
}

/// Release document with embedded tracks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseDocument {
    #[serde(rename = "_id", default)]
    pub id: String,

    #[serde(rename = "_type", default)]
    pub doc_type: String,

    /// Where the release audio comes from (e.g. "upload", "embed")
    #[serde(
        rename = "releaseSource",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub release_source: Option<String>,

    #[serde(default, deserialize_with = "null_as_empty")]
    pub tracks: Vec<Track>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ReleaseDocument {
    /// Tracks with an attached audio file but no derived duration
    pub fn tracks_needing_duration(&self) -> impl Iterator<Item = (usize, &Track)> {
        self.tracks
            .iter()
            .enumerate()
            .filter(|(_, track)| track.needs_duration())
    }

    pub fn needs_duration(&self) -> bool {
        self.tracks.iter().any(Track::needs_duration)
    }
}

/// One track inside a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Track {
    #[serde(rename = "_key", default)]
    pub key: String,

    #[serde(rename = "trackTitle", default)]
    pub title: String,

    #[serde(
        rename = "audioFileUrl",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_file_url: Option<String>,

    /// Derived duration in whole seconds
    #[serde(
        rename = "derivedDuration",
        default,
        deserialize_with = "whole_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub duration: Option<u64>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Track {
    /// Attached audio source, ignoring blank URLs
    pub fn audio_source(&self) -> Option<&str> {
        self.audio_file_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }

    pub fn needs_duration(&self) -> bool {
        self.audio_source().is_some() && self.duration.is_none()
    }
}

fn null_as_empty<'de, D>(deserializer: D) -> Result<Vec<Track>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<Vec<Track>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Editors and older importers store fractional or integer seconds
fn whole_seconds<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    Ok(value
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(|secs| secs.round() as u64))
}
