//! Spotify Web API client (source catalog)
//!
//! Authenticates either with a pre-issued access token (checked once against
//! a known album) or through the OAuth client-credentials flow, refreshing
//! the token shortly before it expires. All calls, token requests included,
//! go through the Spotify [`RequestQueue`].

use crate::error::{MatchError, Result, Service};
use crate::queue::{RequestQueue, RetryPolicy};
use chrono::{DateTime, Duration, Utc};
use reqwest::{Response, StatusCode, Url};
use sbm_common::config::{SpotifyCredentials, SpotifySettings};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// Album requested to check that a pre-issued token is accepted
pub const PROBE_ALBUM_ID: &str = "3u20OXh03DjCUzbf8XcGTq";

/// Tokens are refreshed this long before they expire
const TOKEN_REFRESH_MARGIN_SECS: i64 = 60;

/// Album object (`GET /albums/{id}`)
#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyAlbum {
    pub id: String,
    pub name: String,
    pub artists: Vec<SpotifyArtist>,
    pub release_date: Option<String>,
    #[serde(default)]
    pub release_date_precision: Option<String>,
    pub tracks: TrackPage,
    #[serde(default)]
    pub external_urls: ExternalUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyArtist {
    pub name: String,
}

/// One page of an album's track listing
#[derive(Debug, Clone, Deserialize)]
pub struct TrackPage {
    pub items: Vec<SpotifyTrack>,
    /// URL of the next page, absent on the last one
    pub next: Option<String>,
    pub total: Option<u32>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SpotifyTrack {
    pub name: String,
    #[serde(default)]
    pub duration_ms: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExternalUrls {
    pub spotify: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    /// `None` for pre-issued tokens, which are never refreshed
    refresh_at: Option<DateTime<Utc>>,
}

impl AccessToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.refresh_at.map_or(true, |at| now < at)
    }
}

/// Spotify API client
#[derive(Debug)]
pub struct SpotifyClient {
    queue: RequestQueue,
    api_url: Url,
    token_url: Url,
    credentials: SpotifyCredentials,
    token: RwLock<Option<AccessToken>>,
    retry: RetryPolicy,
}

impl SpotifyClient {
    /// Create an unauthenticated client; the first call obtains a token
    pub fn new(queue: RequestQueue, settings: &SpotifySettings) -> Result<Self> {
        let api_url = parse_url(&settings.api_url, "spotify.api_url")?;
        let token_url = parse_url(&settings.token_url, "spotify.token_url")?;

        Ok(Self {
            queue,
            api_url,
            token_url,
            credentials: settings.credentials.clone(),
            token: RwLock::new(None),
            retry: RetryPolicy::default(),
        })
    }

    /// Create a client and authenticate it
    ///
    /// # Errors
    /// A pre-issued token rejected with 401, or a failed token request.
    pub async fn connect(queue: RequestQueue, settings: &SpotifySettings) -> Result<Self> {
        let client = Self::new(queue, settings)?;
        client.authenticate().await?;
        Ok(client)
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn authenticate(&self) -> Result<()> {
        match &self.credentials {
            SpotifyCredentials::AccessToken(value) => {
                *self.token.write().await = Some(AccessToken {
                    value: value.clone(),
                    refresh_at: None,
                });
                self.validate_access_token(value).await
            }
            SpotifyCredentials::ClientCredentials { .. } => {
                self.bearer().await?;
                Ok(())
            }
        }
    }

    async fn validate_access_token(&self, token: &str) -> Result<()> {
        let url = self.endpoint(&format!("albums/{}", PROBE_ALBUM_ID))?;
        let response = self.send_get(url, token).await?;

        if response.status() == StatusCode::UNAUTHORIZED {
            return Err(sbm_common::Error::Config(
                "Provided Spotify access token is invalid".to_string(),
            )
            .into());
        }

        info!("Using provided Spotify access token");
        Ok(())
    }

    /// Current bearer token, requesting a new one when due
    async fn bearer(&self) -> Result<String> {
        let now = Utc::now();
        if let Some(token) = self.token.read().await.as_ref() {
            if token.is_fresh(now) {
                return Ok(token.value.clone());
            }
        }

        let mut slot = self.token.write().await;
        // Another caller may have refreshed while we waited for the lock
        if let Some(token) = slot.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.value.clone());
            }
        }

        let token = match &self.credentials {
            SpotifyCredentials::ClientCredentials {
                client_id,
                client_secret,
            } => self.request_token(client_id, client_secret).await?,
            SpotifyCredentials::AccessToken(value) => AccessToken {
                value: value.clone(),
                refresh_at: None,
            },
        };

        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn request_token(&self, client_id: &str, client_secret: &str) -> Result<AccessToken> {
        let request = self
            .queue
            .client()
            .post(self.token_url.clone())
            .basic_auth(client_id, Some(client_secret))
            .form(&[("grant_type", "client_credentials")])
            .build()
            .map_err(|e| MatchError::InvalidRequest(e.to_string()))?;

        let response = self.queue.enqueue_with_retry(request, &self.retry).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(MatchError::Upstream {
                service: Service::Spotify,
                status: status.as_u16(),
                context: "access token request".to_string(),
            });
        }

        let body: TokenResponse = self.decode(response, "access token request").await?;
        let refresh_at =
            Utc::now() + Duration::seconds(body.expires_in - TOKEN_REFRESH_MARGIN_SECS);

        info!(expires_in = body.expires_in, "Obtained Spotify access token");

        Ok(AccessToken {
            value: body.access_token,
            refresh_at: Some(refresh_at),
        })
    }

    async fn invalidate_token(&self) {
        if matches!(self.credentials, SpotifyCredentials::ClientCredentials { .. }) {
            *self.token.write().await = None;
        }
    }

    /// Fetch an album with its complete track list
    ///
    /// # Errors
    /// `Upstream` with status 404 (unknown album) or 400 (malformed id) among others.
    pub async fn get_album(&self, album_id: &str) -> Result<SpotifyAlbum> {
        let url = self.endpoint(&format!("albums/{}", album_id))?;
        let context = format!("album {}", album_id);

        let mut album: SpotifyAlbum = self.get_json(url, &context).await?;

        let mut next = album.tracks.next.take();
        while let Some(page_url) = next {
            let url = Url::parse(&page_url).map_err(|e| MatchError::MalformedResponse {
                service: Service::Spotify,
                context: context.clone(),
                detail: format!("invalid next page URL '{}': {}", page_url, e),
            })?;

            debug!(album_id = %album_id, url = %url, "Fetching next track page");
            let page: TrackPage = self.get_json(url, &context).await?;
            album.tracks.items.extend(page.items);
            next = page.next;
        }

        debug!(
            album_id = %album_id,
            name = %album.name,
            tracks = album.tracks.items.len(),
            "Fetched Spotify album"
        );

        Ok(album)
    }

    /// Authorized GET, retried once with a fresh token on 401
    async fn get_json<T: DeserializeOwned>(&self, url: Url, context: &str) -> Result<T> {
        let mut response = self.send_get(url.clone(), &self.bearer().await?).await?;

        if response.status() == StatusCode::UNAUTHORIZED
            && matches!(self.credentials, SpotifyCredentials::ClientCredentials { .. })
        {
            warn!(context = %context, "Spotify rejected the access token, requesting a new one");
            self.invalidate_token().await;
            response = self.send_get(url, &self.bearer().await?).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let context = match status {
                StatusCode::NOT_FOUND => format!("{} (not found)", context),
                StatusCode::BAD_REQUEST => format!("{} (invalid id)", context),
                _ => context.to_string(),
            };
            return Err(MatchError::Upstream {
                service: Service::Spotify,
                status: status.as_u16(),
                context,
            });
        }

        self.decode(response, context).await
    }

    async fn send_get(&self, url: Url, token: &str) -> Result<Response> {
        debug!(url = %url, "Spotify request");

        let request = self
            .queue
            .client()
            .get(url)
            .bearer_auth(token)
            .build()
            .map_err(|e| MatchError::InvalidRequest(e.to_string()))?;

        self.queue.enqueue_with_retry(request, &self.retry).await
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response, context: &str) -> Result<T> {
        let body = response.bytes().await.map_err(|e| MatchError::Transport {
            queue: self.queue.name().to_string(),
            source: e,
        })?;

        serde_json::from_slice(&body).map_err(|e| MatchError::MalformedResponse {
            service: Service::Spotify,
            context: context.to_string(),
            detail: e.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.api_url
            .join(path)
            .map_err(|e| MatchError::InvalidRequest(format!("Spotify path '{}': {}", path, e)))
    }
}

fn parse_url(value: &str, setting: &str) -> Result<Url> {
    Url::parse(value).map_err(|e| {
        sbm_common::Error::Config(format!("Invalid {} '{}': {}", setting, value, e)).into()
    })
}
