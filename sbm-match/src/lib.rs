//! # sbm-match
//!
//! Resolves a Spotify album to its MusicBrainz release.
//!
//! **Flow:** Spotify album lookup → normalized target → relaxation search
//! against the MusicBrainz release index → optional per-candidate detail
//! lookup → scoring → best pick.
//!
//! Outbound calls to each service go through a [`queue::RequestQueue`] that
//! dispatches one request per interval in submission order.

pub mod build_info;
pub mod error;
pub mod evaluation;
pub mod matcher;
pub mod models;
pub mod musicbrainz;
pub mod pipeline;
pub mod queue;
pub mod scoring;
pub mod spotify;

pub use error::{MatchError, Result};
pub use matcher::Matcher;
pub use models::{MatchResult, TargetMetadata, TargetTrack};
pub use pipeline::{AlbumResolver, Pipeline};
pub use queue::{RequestQueue, RetryPolicy};
pub use scoring::Scorer;
