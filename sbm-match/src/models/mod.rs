//! Data models shared by search, scoring and matching

pub mod musicbrainz;
pub mod result;
pub mod target;

pub use musicbrainz::{
    ArtistCredit, CandidateRelease, EnrichedRelease, ReleaseDetail, ReleaseGroupRef,
    ReleaseSearchResponse, ReleaseTrack, UrlSearchResponse,
};
pub use result::{MatchResult, ScoredCandidate, NO_RELEASES_FOUND};
pub use target::{TargetMetadata, TargetTrack};
