//! MusicBrainz Web Service client
//!
//! Every call goes through the MusicBrainz [`RequestQueue`], so the service's
//! rate limit holds across all concurrent matchers sharing the queue. The
//! User-Agent is set on the queue's HTTP client.

use super::query::{build_query, QueryParameter};
use crate::error::{MatchError, Result, Service};
use crate::models::{ReleaseDetail, ReleaseSearchResponse, UrlSearchResponse};
use crate::queue::{RequestQueue, RetryPolicy};
use reqwest::Url;
use sbm_common::config::MusicBrainzSettings;
use serde::de::DeserializeOwned;
use tracing::debug;

/// Release lookup includes used when resolving a URL relation
///
/// `media` carries the per-disc track counts the scorer needs.
pub const URL_RELEASE_INCLUDES: &[&str] = &["artist-credits", "release-groups", "media"];

/// Release lookup includes used for deep-query enrichment
pub const DETAIL_INCLUDES: &[&str] = &["release-groups", "recordings"];

/// Result limit of URL index searches
const URL_SEARCH_LIMIT: u32 = 3;

const DEFAULT_SEARCH_LIMIT: u32 = 20;

/// MusicBrainz API client
#[derive(Debug, Clone)]
pub struct MusicBrainzClient {
    queue: RequestQueue,
    base_url: Url,
    search_limit: u32,
    retry: RetryPolicy,
}

impl MusicBrainzClient {
    /// Create a client for the web service rooted at `base_url` (e.g. `https://musicbrainz.org/ws/2/`)
    pub fn new(queue: RequestQueue, base_url: &str) -> Result<Self> {
        let normalized = if base_url.ends_with('/') {
            base_url.to_string()
        } else {
            format!("{}/", base_url)
        };

        let base_url = Url::parse(&normalized).map_err(|e| {
            sbm_common::Error::Config(format!("Invalid MusicBrainz URL '{}': {}", base_url, e))
        })?;

        Ok(Self {
            queue,
            base_url,
            search_limit: DEFAULT_SEARCH_LIMIT,
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_settings(settings: &MusicBrainzSettings, queue: RequestQueue) -> Result<Self> {
        Ok(Self::new(queue, &settings.api_url)?.with_search_limit(settings.search_limit))
    }

    pub fn with_search_limit(mut self, search_limit: u32) -> Self {
        self.search_limit = search_limit;
        self
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn queue(&self) -> &RequestQueue {
        &self.queue
    }

    /// Search releases with a Lucene query built from `params`
    pub async fn search_releases(&self, params: &[QueryParameter]) -> Result<ReleaseSearchResponse> {
        let query = build_query(params);

        let mut url = self.endpoint("release")?;
        url.query_pairs_mut()
            .append_pair("fmt", "json")
            .append_pair("limit", &self.search_limit.to_string())
            .append_pair("query", &query);

        self.get_json(url, "release search").await
    }

    /// Look up one release by MBID with the given `inc` subqueries
    pub async fn lookup_release(&self, release_id: &str, includes: &[&str]) -> Result<ReleaseDetail> {
        let mut url = self.endpoint(&format!("release/{}", release_id))?;
        url.query_pairs_mut()
            .append_pair("fmt", "json")
            .append_pair("inc", &includes.join("+"));

        self.get_json(url, &format!("release {}", release_id)).await
    }

    /// Search the URL index for an exact resource
    pub async fn search_urls(&self, resource: &str) -> Result<UrlSearchResponse> {
        let mut url = self.endpoint("url")?;
        url.query_pairs_mut()
            .append_pair("fmt", "json")
            .append_pair("query", resource)
            .append_pair("limit", &URL_SEARCH_LIMIT.to_string());

        self.get_json(url, &format!("url {}", resource)).await
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| MatchError::InvalidRequest(format!("MusicBrainz path '{}': {}", path, e)))
    }

    /// Send a GET through the queue and decode a 2xx JSON body
    async fn get_json<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T> {
        debug!(url = %url, "MusicBrainz request");

        let request = self
            .queue
            .client()
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .build()
            .map_err(|e| MatchError::InvalidRequest(e.to_string()))?;

        let response = self.queue.enqueue_with_retry(request, &self.retry).await?;

        let status = response.status();
        if !status.is_success() {
            return Err(MatchError::Upstream {
                service: Service::MusicBrainz,
                status: status.as_u16(),
                context: context.to_string(),
            });
        }

        let body = response.bytes().await.map_err(|e| MatchError::Transport {
            queue: self.queue.name().to_string(),
            source: e,
        })?;

        serde_json::from_slice(&body).map_err(|e| MatchError::MalformedResponse {
            service: Service::MusicBrainz,
            context: context.to_string(),
            detail: e.to_string(),
        })
    }
}
