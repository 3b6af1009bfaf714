//! Progressive-relaxation release search
//!
//! Tries the exact source URL first, then the relaxation stages from strictest
//! to loosest, stopping at the first stage that returns any candidate.

use super::client::{MusicBrainzClient, URL_RELEASE_INCLUDES};
use super::query::{base_parameters, build_query, derive_parameters, SearchStage};
use crate::error::{MatchError, Result};
use crate::models::{CandidateRelease, TargetMetadata};
use tracing::{debug, error, info, warn};

/// Catalog score given to a release resolved through its URL relation
pub const URL_MATCH_SCORE: u32 = 100;

/// How a search ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Source URL linked directly to this release
    UrlRelation { release_id: String },
    /// First stage that returned candidates
    Stage(SearchStage),
    /// Every stage returned nothing
    Exhausted,
    /// A search request came back non-2xx
    Aborted { status: u16 },
}

/// Candidates in catalog order plus how they were found
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub candidates: Vec<CandidateRelease>,
    pub resolution: Resolution,
}

impl SearchOutcome {
    fn empty(resolution: Resolution) -> Self {
        Self {
            candidates: Vec::new(),
            resolution,
        }
    }
}

/// Release search over one MusicBrainz client
pub struct RelaxationSearch<'a> {
    client: &'a MusicBrainzClient,
}

impl<'a> RelaxationSearch<'a> {
    pub fn new(client: &'a MusicBrainzClient) -> Self {
        Self { client }
    }

    /// Find candidate releases for `target`
    ///
    /// # Errors
    /// Transport failures, closed queues and malformed search responses.
    /// Non-2xx search responses end the search with no candidates instead.
    pub async fn run(&self, target: &TargetMetadata) -> Result<SearchOutcome> {
        if let Some(source_url) = target.source_url.as_deref() {
            if let Some(candidate) = self.resolve_by_url(source_url).await? {
                info!(
                    source_url = %source_url,
                    release_id = %candidate.id,
                    "Resolved release through URL relation"
                );
                return Ok(SearchOutcome {
                    resolution: Resolution::UrlRelation {
                        release_id: candidate.id.clone(),
                    },
                    candidates: vec![candidate],
                });
            }
        }

        self.relax(target).await
    }

    /// Exact URL lookup; `None` falls back to the relaxation stages
    async fn resolve_by_url(&self, source_url: &str) -> Result<Option<CandidateRelease>> {
        let urls = match self.client.search_urls(source_url).await {
            Ok(urls) => urls,
            Err(e) if is_recoverable(&e) => {
                warn!(source_url = %source_url, error = %e, "URL lookup failed, falling back to search");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        let Some(release_id) = urls.linked_release_id(source_url) else {
            debug!(source_url = %source_url, "No release linked to URL");
            return Ok(None);
        };

        match self
            .client
            .lookup_release(release_id, URL_RELEASE_INCLUDES)
            .await
        {
            Ok(detail) => Ok(Some(detail.into_candidate(URL_MATCH_SCORE))),
            Err(e) if is_recoverable(&e) => {
                warn!(
                    release_id = %release_id,
                    error = %e,
                    "Linked release lookup failed, falling back to search"
                );
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    async fn relax(&self, target: &TargetMetadata) -> Result<SearchOutcome> {
        let base = base_parameters(target);
        let mut stage = SearchStage::first();

        loop {
            let params = derive_parameters(&base, stage);
            if params.is_empty() {
                info!(title = %target.title, "No releases found at any relaxation stage");
                return Ok(SearchOutcome::empty(Resolution::Exhausted));
            }

            debug!(stage = %stage, query = %build_query(&params), "Searching releases");

            match self.client.search_releases(&params).await {
                Ok(response) if !response.releases.is_empty() => {
                    info!(
                        stage = %stage,
                        candidates = response.releases.len(),
                        total = response.count,
                        "Found candidate releases"
                    );
                    return Ok(SearchOutcome {
                        candidates: response.releases,
                        resolution: Resolution::Stage(stage),
                    });
                }
                Ok(_) => {
                    debug!(stage = %stage, "No results, relaxing query");
                }
                Err(MatchError::Upstream { status, .. }) => {
                    error!(stage = %stage, status, "Release search failed, aborting");
                    return Ok(SearchOutcome::empty(Resolution::Aborted { status }));
                }
                Err(e) => return Err(e),
            }

            stage = stage.next();
        }
    }
}

/// Failures of the URL short-circuit that fall back to regular search
fn is_recoverable(e: &MatchError) -> bool {
    matches!(
        e,
        MatchError::Upstream { .. } | MatchError::MalformedResponse { .. }
    )
}
