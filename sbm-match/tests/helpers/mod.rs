//! In-process mock MusicBrainz and Spotify servers for integration tests
//!
//! Both servers bind to 127.0.0.1:0 and record every request they receive
//! (path, query parameters, User-Agent, arrival time) for later assertions.

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use reqwest::Client;
use sbm_match::musicbrainz::MusicBrainzClient;
use sbm_match::queue::RequestQueue;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

pub const TEST_USER_AGENT: &str = "sbm-match-tests/0.1 ( tests@example.com )";

/// Rate fast enough to keep tests short
pub const FAST_RATE: f64 = 50.0;

/// Canned response of a mock route
#[derive(Debug, Clone)]
pub enum MockResponse {
    Json(Value),
    Status(u16),
}

impl IntoResponse for MockResponse {
    fn into_response(self) -> Response {
        match self {
            MockResponse::Json(body) => Json(body).into_response(),
            MockResponse::Status(code) => StatusCode::from_u16(code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
                .into_response(),
        }
    }
}

/// One request as seen by a mock server
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub params: HashMap<String, String>,
    pub user_agent: Option<String>,
    pub at: Instant,
}

type Log = Arc<Mutex<Vec<RecordedRequest>>>;

fn record(log: &Log, path: String, params: HashMap<String, String>, headers: &HeaderMap) {
    let user_agent = headers
        .get(axum::http::header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);

    log.lock().unwrap().push(RecordedRequest {
        path,
        params,
        user_agent,
        at: Instant::now(),
    });
}

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ---------------------------------------------------------------------------
// MusicBrainz
// ---------------------------------------------------------------------------

type SearchFn = Arc<dyn Fn(&str) -> MockResponse + Send + Sync>;

#[derive(Clone)]
struct MusicBrainzState {
    log: Log,
    search: SearchFn,
    releases: Arc<HashMap<String, MockResponse>>,
    urls: Arc<MockResponse>,
}

/// Mock of the `/ws/2/` web service
pub struct MockMusicBrainz {
    pub base_url: String,
    log: Log,
}

pub struct MockMusicBrainzBuilder {
    search: SearchFn,
    releases: HashMap<String, MockResponse>,
    urls: MockResponse,
}

impl MockMusicBrainz {
    pub fn builder() -> MockMusicBrainzBuilder {
        MockMusicBrainzBuilder {
            search: Arc::new(|_| MockResponse::Json(search_response(vec![]))),
            releases: HashMap::new(),
            urls: MockResponse::Json(json!({"count": 0, "urls": []})),
        }
    }

    /// Web service root, as configured in settings
    pub fn api_url(&self) -> String {
        format!("{}/ws/2/", self.base_url)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().unwrap().clone()
    }

    /// Lucene queries of every release search, in arrival order
    pub fn search_queries(&self) -> Vec<String> {
        self.requests()
            .into_iter()
            .filter(|r| r.path == "/ws/2/release")
            .filter_map(|r| r.params.get("query").cloned())
            .collect()
    }
}

impl MockMusicBrainzBuilder {
    /// Answer release searches by Lucene query
    pub fn search<F>(mut self, f: F) -> Self
    where
        F: Fn(&str) -> MockResponse + Send + Sync + 'static,
    {
        self.search = Arc::new(f);
        self
    }

    /// Answer lookups of one release id (unknown ids get 404)
    pub fn release(mut self, id: &str, response: MockResponse) -> Self {
        self.releases.insert(id.to_string(), response);
        self
    }

    /// Answer URL index searches
    pub fn urls(mut self, response: MockResponse) -> Self {
        self.urls = response;
        self
    }

    pub async fn start(self) -> MockMusicBrainz {
        let log: Log = Arc::default();
        let state = MusicBrainzState {
            log: Arc::clone(&log),
            search: self.search,
            releases: Arc::new(self.releases),
            urls: Arc::new(self.urls),
        };

        let app = Router::new()
            .route("/ws/2/release", get(mb_search))
            .route("/ws/2/release/:id", get(mb_lookup))
            .route("/ws/2/url", get(mb_urls))
            .with_state(state);

        MockMusicBrainz {
            base_url: serve(app).await,
            log,
        }
    }
}

async fn mb_search(
    State(state): State<MusicBrainzState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> MockResponse {
    let query = params.get("query").cloned().unwrap_or_default();
    record(&state.log, "/ws/2/release".into(), params, &headers);
    (state.search)(&query)
}

async fn mb_lookup(
    State(state): State<MusicBrainzState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> MockResponse {
    record(&state.log, format!("/ws/2/release/{}", id), params, &headers);
    state
        .releases
        .get(&id)
        .cloned()
        .unwrap_or(MockResponse::Status(404))
}

async fn mb_urls(
    State(state): State<MusicBrainzState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> MockResponse {
    record(&state.log, "/ws/2/url".into(), params, &headers);
    (*state.urls).clone()
}

/// Search response body with the given releases
pub fn search_response(releases: Vec<Value>) -> Value {
    json!({
        "created": "2024-01-01T00:00:00.000Z",
        "count": releases.len(),
        "offset": 0,
        "releases": releases,
    })
}

/// Search-result release
pub fn release_json(
    id: &str,
    title: &str,
    artist: &str,
    track_count: u32,
    release_group_id: &str,
) -> Value {
    json!({
        "id": id,
        "score": 100,
        "title": title,
        "status": "Official",
        "date": "2019-09-27",
        "country": null,
        "track-count": track_count,
        "artist-credit": [{"name": artist, "artist": {"id": "artist-1", "name": artist}}],
        "release-group": {"id": release_group_id, "primary-type": "Album"}
    })
}

/// Release lookup body with a track list and group first-release date
pub fn release_detail_json(
    id: &str,
    title: &str,
    artist: &str,
    release_group_id: &str,
    first_release_date: &str,
    tracks: &[&str],
) -> Value {
    let tracks: Vec<Value> = tracks
        .iter()
        .enumerate()
        .map(|(i, t)| json!({"position": i + 1, "title": t, "length": 180000}))
        .collect();

    json!({
        "id": id,
        "title": title,
        "date": first_release_date,
        "country": "XW",
        "artist-credit": [{"name": artist}],
        "release-group": {"id": release_group_id, "first-release-date": first_release_date},
        "media": [{"position": 1, "track-count": tracks.len(), "tracks": tracks}]
    })
}

// ---------------------------------------------------------------------------
// Spotify
// ---------------------------------------------------------------------------

pub const CLIENT_ID: &str = "test-client";
pub const CLIENT_SECRET: &str = "test-secret";
pub const ISSUED_TOKEN: &str = "issued-token";

#[derive(Clone)]
struct SpotifyState {
    log: Log,
    base_url: Arc<Mutex<String>>,
    albums: Arc<HashMap<String, Value>>,
    page_size: usize,
    token_lifetime_secs: i64,
    valid_tokens: Arc<Vec<String>>,
}

/// Mock of the Spotify Web API and accounts service
pub struct MockSpotify {
    pub base_url: String,
    log: Log,
}

pub struct MockSpotifyBuilder {
    albums: HashMap<String, Value>,
    page_size: usize,
    token_lifetime_secs: i64,
    valid_tokens: Vec<String>,
}

impl MockSpotify {
    pub fn builder() -> MockSpotifyBuilder {
        MockSpotifyBuilder {
            albums: HashMap::new(),
            page_size: 50,
            token_lifetime_secs: 3600,
            valid_tokens: vec![ISSUED_TOKEN.to_string()],
        }
    }

    pub fn api_url(&self) -> String {
        format!("{}/v1/", self.base_url)
    }

    pub fn token_url(&self) -> String {
        format!("{}/api/token", self.base_url)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.log.lock().unwrap().clone()
    }

    pub fn token_requests(&self) -> usize {
        self.requests()
            .iter()
            .filter(|r| r.path == "/api/token")
            .count()
    }
}

impl MockSpotifyBuilder {
    /// Serve an album: `(name, artists, release_date, track names)`
    pub fn album(mut self, id: &str, name: &str, artists: &[&str], release_date: &str, tracks: &[&str]) -> Self {
        let album = json!({
            "id": id,
            "name": name,
            "artists": artists.iter().map(|a| json!({"name": a})).collect::<Vec<_>>(),
            "release_date": release_date,
            "release_date_precision": "day",
            "tracks": tracks
                .iter()
                .map(|t| json!({"name": t, "duration_ms": 200000}))
                .collect::<Vec<_>>(),
        });
        self.albums.insert(id.to_string(), album);
        self
    }

    /// Tracks per page of the album track listing
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// `expires_in` of issued tokens
    pub fn token_lifetime(mut self, secs: i64) -> Self {
        self.token_lifetime_secs = secs;
        self
    }

    /// Also accept this pre-issued bearer token
    pub fn accept_token(mut self, token: &str) -> Self {
        self.valid_tokens.push(token.to_string());
        self
    }

    pub async fn start(self) -> MockSpotify {
        let log: Log = Arc::default();
        let base_url = Arc::new(Mutex::new(String::new()));
        let state = SpotifyState {
            log: Arc::clone(&log),
            base_url: Arc::clone(&base_url),
            albums: Arc::new(self.albums),
            page_size: self.page_size,
            token_lifetime_secs: self.token_lifetime_secs,
            valid_tokens: Arc::new(self.valid_tokens),
        };

        let app = Router::new()
            .route("/api/token", post(sp_token))
            .route("/v1/albums/:id", get(sp_album))
            .route("/v1/albums/:id/tracks", get(sp_tracks))
            .with_state(state);

        let url = serve(app).await;
        *base_url.lock().unwrap() = url.clone();

        MockSpotify { base_url: url, log }
    }
}

fn authorized(state: &SpotifyState, headers: &HeaderMap) -> bool {
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|token| state.valid_tokens.iter().any(|t| t == token))
        .unwrap_or(false)
}

async fn sp_token(
    State(state): State<SpotifyState>,
    headers: HeaderMap,
    Form(form): Form<HashMap<String, String>>,
) -> MockResponse {
    record(&state.log, "/api/token".into(), form.clone(), &headers);

    // "test-client:test-secret"
    let expected = "Basic dGVzdC1jbGllbnQ6dGVzdC1zZWNyZXQ=";
    let auth = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok());

    if auth != Some(expected) || form.get("grant_type").map(String::as_str) != Some("client_credentials") {
        return MockResponse::Status(400);
    }

    MockResponse::Json(json!({
        "access_token": ISSUED_TOKEN,
        "token_type": "Bearer",
        "expires_in": state.token_lifetime_secs,
    }))
}

/// Page `offset..offset+page_size` of an album's tracks
fn track_page(state: &SpotifyState, id: &str, all: &[Value], offset: usize) -> Value {
    let end = (offset + state.page_size).min(all.len());
    let next = if end < all.len() {
        let base = state.base_url.lock().unwrap().clone();
        Value::String(format!(
            "{}/v1/albums/{}/tracks?offset={}&limit={}",
            base, id, end, state.page_size
        ))
    } else {
        Value::Null
    };

    json!({
        "items": all[offset..end].to_vec(),
        "next": next,
        "total": all.len(),
    })
}

async fn sp_album(
    State(state): State<SpotifyState>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> MockResponse {
    record(&state.log, format!("/v1/albums/{}", id), HashMap::new(), &headers);

    if !authorized(&state, &headers) {
        return MockResponse::Status(401);
    }
    if id.contains('!') {
        return MockResponse::Status(400);
    }
    let Some(album) = state.albums.get(&id) else {
        return MockResponse::Status(404);
    };

    let all = album["tracks"].as_array().cloned().unwrap_or_default();
    let mut body = album.clone();
    body["tracks"] = track_page(&state, &id, &all, 0);
    MockResponse::Json(body)
}

async fn sp_tracks(
    State(state): State<SpotifyState>,
    Path(id): Path<String>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> MockResponse {
    let offset = params
        .get("offset")
        .and_then(|o| o.parse().ok())
        .unwrap_or(0);
    record(&state.log, format!("/v1/albums/{}/tracks", id), params, &headers);

    if !authorized(&state, &headers) {
        return MockResponse::Status(401);
    }
    let Some(album) = state.albums.get(&id) else {
        return MockResponse::Status(404);
    };

    let all = album["tracks"].as_array().cloned().unwrap_or_default();
    MockResponse::Json(track_page(&state, &id, &all, offset.min(all.len())))
}

// ---------------------------------------------------------------------------
// Clients
// ---------------------------------------------------------------------------

pub fn http_client() -> Client {
    Client::builder().user_agent(TEST_USER_AGENT).build().unwrap()
}

/// MusicBrainz client on a fresh queue at [`FAST_RATE`]
pub fn musicbrainz_client(server: &MockMusicBrainz) -> (MusicBrainzClient, RequestQueue) {
    let queue = RequestQueue::start("musicbrainz", http_client(), FAST_RATE).unwrap();
    let client = MusicBrainzClient::new(queue.clone(), &server.api_url()).unwrap();
    (client, queue)
}
