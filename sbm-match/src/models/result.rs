//! Match outcome types

use super::CandidateRelease;
use serde::{Deserialize, Serialize};

/// Message of the error result when no candidate survives the search
pub const NO_RELEASES_FOUND: &str = "No releases found";

/// Candidate with its computed score
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub candidate: CandidateRelease,
    pub score: f64,
}

/// Outcome of matching one target
///
/// Serialized as `{"status": "success", ...}` or `{"status": "error", "message": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum MatchResult {
    Success {
        release_id: String,
        release_group_id: String,
        /// The search engine's own relevance score, for diagnostics
        catalog_score: u32,
        /// Score computed by [`crate::scoring::Scorer`]
        filter_score: f64,
    },
    Error {
        message: String,
    },
}

impl MatchResult {
    pub fn error(message: impl Into<String>) -> Self {
        MatchResult::Error {
            message: message.into(),
        }
    }

    pub fn not_found() -> Self {
        Self::error(NO_RELEASES_FOUND)
    }

    pub fn from_best(best: &ScoredCandidate) -> Self {
        MatchResult::Success {
            release_id: best.candidate.id.clone(),
            release_group_id: best.candidate.release_group.id.clone(),
            catalog_score: best.candidate.score,
            filter_score: best.score,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, MatchResult::Success { .. })
    }

    pub fn release_id(&self) -> Option<&str> {
        match self {
            MatchResult::Success { release_id, .. } => Some(release_id),
            MatchResult::Error { .. } => None,
        }
    }

    pub fn release_group_id(&self) -> Option<&str> {
        match self {
            MatchResult::Success {
                release_group_id, ..
            } => Some(release_group_id),
            MatchResult::Error { .. } => None,
        }
    }
}
