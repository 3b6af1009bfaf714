//! Normalized description of the album being matched

use serde::{Deserialize, Serialize};

/// One track of the source album
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetTrack {
    pub name: String,
    pub duration_ms: u64,
}

impl TargetTrack {
    pub fn new(name: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            duration_ms,
        }
    }
}

/// Album to resolve against the reference catalog
///
/// Built once by the normalizer (or directly by callers/tests) and only read
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetadata {
    /// Normalized album title
    pub title: String,
    /// Artist names in credit order
    pub artists: Vec<String>,
    /// Tracks in album order
    pub tracks: Vec<TargetTrack>,
    /// Release date: `YYYY-MM-DD`, `YYYY-MM` or `YYYY`
    pub release_date: Option<String>,
    /// Source catalog URL of the album, used for the exact-URL lookup
    pub source_url: Option<String>,
}

impl TargetMetadata {
    pub fn new(title: impl Into<String>, artists: Vec<String>, tracks: Vec<TargetTrack>) -> Self {
        Self {
            title: title.into(),
            artists,
            tracks,
            release_date: None,
            source_url: None,
        }
    }

    pub fn with_release_date(mut self, release_date: impl Into<String>) -> Self {
        self.release_date = Some(release_date.into());
        self
    }

    pub fn with_source_url(mut self, source_url: impl Into<String>) -> Self {
        self.source_url = Some(source_url.into());
        self
    }
}
