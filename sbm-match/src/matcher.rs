//! Match coordination: search, optional enrichment, scoring, selection

use crate::error::{MatchError, Result};
use crate::models::{CandidateRelease, EnrichedRelease, MatchResult, TargetMetadata};
use crate::musicbrainz::client::DETAIL_INCLUDES;
use crate::musicbrainz::{MusicBrainzClient, RelaxationSearch};
use crate::scoring::Scorer;
use tracing::{debug, info, warn};

/// Candidates considered per target, in catalog order
pub const CANDIDATE_LIMIT: usize = 20;

/// Best scores at or below this are reported as low confidence
pub const LOW_CONFIDENCE_THRESHOLD: f64 = 70.0;

/// Message when deep-query enrichment failed for every candidate
pub const NO_RELEASES_SCORED: &str = "No releases could be scored";

/// Resolves one target album to its best reference release
pub struct Matcher {
    client: MusicBrainzClient,
    scorer: Scorer,
    deep_query: bool,
}

impl Matcher {
    pub fn new(client: MusicBrainzClient, scorer: Scorer) -> Self {
        Self {
            client,
            scorer,
            deep_query: false,
        }
    }

    /// Fetch full release detail (tracks, group date) for every candidate
    pub fn with_deep_query(mut self, deep_query: bool) -> Self {
        self.deep_query = deep_query;
        self
    }

    pub fn client(&self) -> &MusicBrainzClient {
        &self.client
    }

    /// Find the best matching release
    ///
    /// "No match" is an `Ok(MatchResult::Error)`; `Err` is reserved for
    /// transport failures, malformed search responses and closed queues.
    pub async fn match_release(&self, target: &TargetMetadata) -> Result<MatchResult> {
        let outcome = RelaxationSearch::new(&self.client).run(target).await?;
        debug!(resolution = ?outcome.resolution, "Search finished");

        if outcome.candidates.is_empty() {
            info!(title = %target.title, "No releases found");
            return Ok(MatchResult::not_found());
        }

        let mut candidates = outcome.candidates;
        candidates.truncate(CANDIDATE_LIMIT);

        let releases = if self.deep_query {
            self.enrich(candidates).await?
        } else {
            candidates.into_iter().map(EnrichedRelease::from).collect()
        };

        let ranked = self.scorer.rank(releases, target);
        let Some(best) = ranked.first() else {
            warn!(title = %target.title, "Every candidate failed enrichment");
            return Ok(MatchResult::error(NO_RELEASES_SCORED));
        };

        if best.score <= LOW_CONFIDENCE_THRESHOLD {
            warn!(
                title = %target.title,
                release_id = %best.candidate.id,
                score = best.score,
                "Low confidence match"
            );
        }

        info!(
            title = %target.title,
            release_id = %best.candidate.id,
            release_group_id = %best.candidate.release_group.id,
            score = best.score,
            candidates = ranked.len(),
            "Selected release"
        );

        Ok(MatchResult::from_best(best))
    }

    /// Sequential detail fetch per candidate; failed lookups are skipped
    async fn enrich(&self, candidates: Vec<CandidateRelease>) -> Result<Vec<EnrichedRelease>> {
        let mut enriched = Vec::with_capacity(candidates.len());

        for candidate in candidates {
            match self.client.lookup_release(&candidate.id, DETAIL_INCLUDES).await {
                Ok(detail) => enriched.push(EnrichedRelease::with_detail(candidate, detail)),
                Err(e @ MatchError::QueueClosed(_)) => return Err(e),
                Err(e) => {
                    warn!(release_id = %candidate.id, error = %e, "Skipping candidate, detail lookup failed");
                }
            }
        }

        Ok(enriched)
    }
}
