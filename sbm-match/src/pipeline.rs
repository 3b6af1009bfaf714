//! End-to-end resolution of a Spotify album id
//!
//! Owns both request queues and both service clients. Clones of the queues
//! are shared by every concurrent `match_album` call, so the per-service rate
//! limits hold across a whole batch.

use crate::error::{MatchError, Result};
use crate::matcher::Matcher;
use crate::models::MatchResult;
use crate::musicbrainz::MusicBrainzClient;
use crate::queue::{RequestQueue, RetryPolicy};
use crate::scoring::Scorer;
use crate::spotify::{prepare_target, SpotifyClient};
use async_trait::async_trait;
use reqwest::Client;
use sbm_common::Settings;
use tracing::info;

pub const MUSICBRAINZ_QUEUE: &str = "musicbrainz";
pub const SPOTIFY_QUEUE: &str = "spotify";

/// Anything that turns a source album id into a match result
#[async_trait]
pub trait AlbumResolver: Send + Sync {
    async fn resolve_album(&self, album_id: &str) -> Result<MatchResult>;
}

/// HTTP client carrying the User-Agent for both services
pub fn build_http_client(user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .build()
        .map_err(|e| MatchError::InvalidRequest(format!("HTTP client: {}", e)))
}

pub struct Pipeline {
    spotify: SpotifyClient,
    matcher: Matcher,
    musicbrainz_queue: RequestQueue,
    spotify_queue: RequestQueue,
}

impl Pipeline {
    /// Start both queues and authenticate with Spotify
    pub async fn from_settings(settings: &Settings) -> Result<Self> {
        let http = build_http_client(&settings.user_agent)?;

        let musicbrainz_queue = RequestQueue::start(
            MUSICBRAINZ_QUEUE,
            http.clone(),
            settings.musicbrainz.requests_per_second,
        )?;
        let spotify_queue =
            RequestQueue::start(SPOTIFY_QUEUE, http, settings.spotify.requests_per_second)?;

        let retry = RetryPolicy::with_retries(settings.retry_count);

        let musicbrainz =
            MusicBrainzClient::from_settings(&settings.musicbrainz, musicbrainz_queue.clone())?
                .with_retry_policy(retry.clone());
        let scorer = Scorer::with_preferred_country(settings.preferred_country.clone());
        let matcher = Matcher::new(musicbrainz, scorer).with_deep_query(settings.query_release);

        let spotify = SpotifyClient::connect(spotify_queue.clone(), &settings.spotify)
            .await?
            .with_retry_policy(retry);

        info!(
            musicbrainz_url = %settings.musicbrainz.api_url,
            deep_query = settings.query_release,
            retry_count = settings.retry_count,
            "Pipeline ready"
        );

        Ok(Self {
            spotify,
            matcher,
            musicbrainz_queue,
            spotify_queue,
        })
    }

    /// Assemble a pipeline from already-built parts
    pub fn new(
        spotify: SpotifyClient,
        matcher: Matcher,
        musicbrainz_queue: RequestQueue,
        spotify_queue: RequestQueue,
    ) -> Self {
        Self {
            spotify,
            matcher,
            musicbrainz_queue,
            spotify_queue,
        }
    }

    /// Fetch, normalize and match one album
    pub async fn match_album(&self, album_id: &str) -> Result<MatchResult> {
        let album = self.spotify.get_album(album_id).await?;
        let target = prepare_target(&album);

        info!(
            album_id = %album_id,
            title = %target.title,
            artists = ?target.artists,
            tracks = target.tracks.len(),
            "Matching album"
        );

        self.matcher.match_release(&target).await
    }

    /// Stop both queue drivers
    pub fn shutdown(&self) {
        self.musicbrainz_queue.shutdown();
        self.spotify_queue.shutdown();
    }
}

#[async_trait]
impl AlbumResolver for Pipeline {
    async fn resolve_album(&self, album_id: &str) -> Result<MatchResult> {
        self.match_album(album_id).await
    }
}
