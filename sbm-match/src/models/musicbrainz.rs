//! MusicBrainz Web Service (WS/2) response types
//!
//! Only the fields the matcher reads are modelled. Deserialization failures
//! surface as `MatchError::MalformedResponse` at the client boundary.

use serde::{Deserialize, Serialize};

/// Release search response (`/release?query=...`)
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseSearchResponse {
    #[serde(default)]
    pub count: u32,
    pub releases: Vec<CandidateRelease>,
}

/// One release returned by the search endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateRelease {
    /// Release MBID
    pub id: String,
    /// Search engine relevance score (0-100)
    #[serde(default)]
    pub score: u32,
    pub title: String,
    pub date: Option<String>,
    pub country: Option<String>,
    pub disambiguation: Option<String>,
    #[serde(rename = "track-count", default)]
    pub track_count: u32,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(rename = "release-group")]
    pub release_group: ReleaseGroupRef,
}

impl CandidateRelease {
    /// Credited artist names in credit order
    pub fn artist_names(&self) -> impl Iterator<Item = &str> {
        self.artist_credit.iter().map(|ac| ac.name.as_str())
    }
}

/// MusicBrainz artist credit (display name only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtistCredit {
    pub name: String,
}

/// Parent release group of a release
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseGroupRef {
    /// Release group MBID
    pub id: String,
    /// Present on lookups; usually absent from search results
    #[serde(rename = "first-release-date")]
    pub first_release_date: Option<String>,
}

/// Release lookup response (`/release/{id}?inc=...`)
#[derive(Debug, Clone, Deserialize)]
pub struct ReleaseDetail {
    pub id: String,
    pub title: String,
    pub date: Option<String>,
    pub country: Option<String>,
    pub disambiguation: Option<String>,
    #[serde(rename = "artist-credit", default)]
    pub artist_credit: Vec<ArtistCredit>,
    #[serde(rename = "release-group")]
    pub release_group: ReleaseGroupRef,
    #[serde(default)]
    pub media: Vec<Medium>,
}

/// One medium (disc) of a release
#[derive(Debug, Clone, Deserialize)]
pub struct Medium {
    #[serde(rename = "track-count", default)]
    pub track_count: u32,
    /// Only present when recordings were requested
    pub tracks: Option<Vec<ReleaseTrack>>,
}

/// Track of a release medium
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReleaseTrack {
    pub title: String,
    /// Length in milliseconds
    pub length: Option<u64>,
}

impl ReleaseDetail {
    /// Total declared track count over all media
    pub fn track_count(&self) -> u32 {
        self.media.iter().map(|m| m.track_count).sum()
    }

    /// Flattened track list, or `None` when no medium carried tracks
    pub fn tracks(&self) -> Option<Vec<ReleaseTrack>> {
        if self.media.iter().all(|m| m.tracks.is_none()) {
            return None;
        }

        Some(
            self.media
                .iter()
                .filter_map(|m| m.tracks.as_ref())
                .flatten()
                .cloned()
                .collect(),
        )
    }

    /// Convert a looked-up release into a search-style candidate
    ///
    /// Lookups carry no relevance score, so the caller supplies one.
    pub fn into_candidate(self, score: u32) -> CandidateRelease {
        let track_count = self.track_count();
        CandidateRelease {
            id: self.id,
            score,
            title: self.title,
            date: self.date,
            country: self.country,
            disambiguation: self.disambiguation,
            track_count,
            artist_credit: self.artist_credit,
            release_group: self.release_group,
        }
    }
}

/// URL search response (`/url?query=...`)
#[derive(Debug, Clone, Deserialize)]
pub struct UrlSearchResponse {
    #[serde(default)]
    pub count: u32,
    pub urls: Vec<UrlEntry>,
}

/// One URL resource with its relations
#[derive(Debug, Clone, Deserialize)]
pub struct UrlEntry {
    pub id: String,
    pub resource: String,
    #[serde(rename = "relation-list", default)]
    pub relation_list: Vec<RelationList>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationList {
    #[serde(default)]
    pub relations: Vec<Relation>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Relation {
    #[serde(rename = "type")]
    pub relation_type: Option<String>,
    pub release: Option<RelationRelease>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RelationRelease {
    pub id: String,
    pub title: Option<String>,
}

impl UrlSearchResponse {
    /// First release linked from a URL entry whose resource is exactly `resource`
    pub fn linked_release_id(&self, resource: &str) -> Option<&str> {
        self.urls
            .iter()
            .filter(|u| u.resource == resource)
            .flat_map(|u| u.relation_list.iter())
            .flat_map(|rl| rl.relations.iter())
            .find_map(|r| r.release.as_ref())
            .map(|release| release.id.as_str())
    }
}

/// Candidate plus the detail used for scoring
///
/// Without deep-query mode only the search fields are known: the group date
/// comes from the search result (usually absent) and `tracks` is `None`.
#[derive(Debug, Clone, PartialEq)]
pub struct EnrichedRelease {
    pub release: CandidateRelease,
    pub first_release_date: Option<String>,
    pub tracks: Option<Vec<ReleaseTrack>>,
}

impl EnrichedRelease {
    /// Combine a search candidate with its looked-up detail
    pub fn with_detail(release: CandidateRelease, detail: ReleaseDetail) -> Self {
        let tracks = detail.tracks();
        let first_release_date = detail
            .release_group
            .first_release_date
            .or_else(|| release.release_group.first_release_date.clone());

        Self {
            release,
            first_release_date,
            tracks,
        }
    }
}

impl From<CandidateRelease> for EnrichedRelease {
    fn from(release: CandidateRelease) -> Self {
        let first_release_date = release.release_group.first_release_date.clone();
        Self {
            release,
            first_release_date,
            tracks: None,
        }
    }
}
