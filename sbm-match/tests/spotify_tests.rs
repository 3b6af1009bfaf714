//! Spotify client and full pipeline tests against mock services

mod helpers;

use helpers::{
    http_client, musicbrainz_client, release_json, search_response, MockMusicBrainz,
    MockResponse, MockSpotify, CLIENT_ID, CLIENT_SECRET, FAST_RATE,
};
use sbm_common::config::{SpotifyCredentials, SpotifySettings};
use sbm_match::spotify::{prepare_target, SpotifyClient};
use sbm_match::{AlbumResolver, MatchError, Matcher, Pipeline, RequestQueue, Scorer};

const ALBUM_ID: &str = "0ETFjACtuP2ADo6LFhL6HN";

const ABBEY_ROAD_TRACKS: [&str; 5] = [
    "Come Together - Remastered 2009",
    "Something - Remastered 2009",
    "Maxwell's Silver Hammer",
    "Oh! Darling",
    "Octopus's Garden",
];

async fn spotify_server() -> MockSpotify {
    MockSpotify::builder()
        .album(
            ALBUM_ID,
            "Abbey Road (Remastered)",
            &["The Beatles"],
            "1969-09-26",
            &ABBEY_ROAD_TRACKS,
        )
        .page_size(2)
        .accept_token("pre-issued")
        .start()
        .await
}

fn settings(server: &MockSpotify, credentials: SpotifyCredentials) -> SpotifySettings {
    SpotifySettings {
        credentials,
        requests_per_second: FAST_RATE,
        api_url: server.api_url(),
        token_url: server.token_url(),
    }
}

fn client_credentials() -> SpotifyCredentials {
    SpotifyCredentials::ClientCredentials {
        client_id: CLIENT_ID.into(),
        client_secret: CLIENT_SECRET.into(),
    }
}

fn spotify_queue() -> RequestQueue {
    RequestQueue::start("spotify", http_client(), FAST_RATE).unwrap()
}

#[tokio::test]
async fn test_album_fetch_follows_track_pages() {
    let server = spotify_server().await;
    let queue = spotify_queue();
    let client = SpotifyClient::connect(queue.clone(), &settings(&server, client_credentials()))
        .await
        .unwrap();

    let album = client.get_album(ALBUM_ID).await.unwrap();

    let names: Vec<_> = album.tracks.items.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ABBEY_ROAD_TRACKS.to_vec());
    assert!(album.tracks.next.is_none());

    // One album page plus two track pages of two
    let pages = server
        .requests()
        .iter()
        .filter(|r| r.path.starts_with("/v1/albums/"))
        .count();
    assert_eq!(pages, 3);
    queue.shutdown();
}

#[tokio::test]
async fn test_client_credentials_token_is_reused() {
    let server = spotify_server().await;
    let queue = spotify_queue();
    let client = SpotifyClient::connect(queue.clone(), &settings(&server, client_credentials()))
        .await
        .unwrap();

    client.get_album(ALBUM_ID).await.unwrap();
    client.get_album(ALBUM_ID).await.unwrap();

    assert_eq!(server.token_requests(), 1);
    queue.shutdown();
}

#[tokio::test]
async fn test_short_lived_token_is_refreshed() {
    // Lifetime under the refresh margin: every call needs a new token
    let server = MockSpotify::builder()
        .album(ALBUM_ID, "Abbey Road", &["The Beatles"], "1969-09-26", &ABBEY_ROAD_TRACKS)
        .token_lifetime(30)
        .start()
        .await;
    let queue = spotify_queue();
    let client = SpotifyClient::connect(queue.clone(), &settings(&server, client_credentials()))
        .await
        .unwrap();

    client.get_album(ALBUM_ID).await.unwrap();
    client.get_album(ALBUM_ID).await.unwrap();

    assert_eq!(server.token_requests(), 3);
    queue.shutdown();
}

#[tokio::test]
async fn test_wrong_client_secret_fails_to_connect() {
    let server = spotify_server().await;
    let queue = spotify_queue();
    let credentials = SpotifyCredentials::ClientCredentials {
        client_id: CLIENT_ID.into(),
        client_secret: "wrong".into(),
    };

    let result = SpotifyClient::connect(queue.clone(), &settings(&server, credentials)).await;

    assert!(matches!(result, Err(MatchError::Upstream { status: 400, .. })));
    queue.shutdown();
}

#[tokio::test]
async fn test_pre_issued_token_is_validated_once() {
    let server = spotify_server().await;
    let queue = spotify_queue();
    let credentials = SpotifyCredentials::AccessToken("pre-issued".into());

    let client = SpotifyClient::connect(queue.clone(), &settings(&server, credentials))
        .await
        .unwrap();
    client.get_album(ALBUM_ID).await.unwrap();

    assert_eq!(server.token_requests(), 0);
    assert_eq!(server.requests()[0].path, "/v1/albums/3u20OXh03DjCUzbf8XcGTq");
    queue.shutdown();
}

#[tokio::test]
async fn test_rejected_pre_issued_token_is_a_config_error() {
    let server = spotify_server().await;
    let queue = spotify_queue();
    let credentials = SpotifyCredentials::AccessToken("expired".into());

    let result = SpotifyClient::connect(queue.clone(), &settings(&server, credentials)).await;

    match result {
        Err(MatchError::Common(e)) => assert!(e.to_string().contains("invalid")),
        other => panic!("expected configuration error, got {:?}", other.map(|_| ())),
    }
    queue.shutdown();
}

#[tokio::test]
async fn test_unknown_and_invalid_album_ids() {
    let server = spotify_server().await;
    let queue = spotify_queue();
    let client = SpotifyClient::connect(queue.clone(), &settings(&server, client_credentials()))
        .await
        .unwrap();

    let missing = client.get_album("doesnotexist").await;
    assert!(matches!(missing, Err(MatchError::Upstream { status: 404, .. })));

    let invalid = client.get_album("not!valid").await;
    assert!(matches!(invalid, Err(MatchError::Upstream { status: 400, .. })));
    queue.shutdown();
}

#[tokio::test]
async fn test_prepared_target_from_fetched_album() {
    let server = spotify_server().await;
    let queue = spotify_queue();
    let client = SpotifyClient::connect(queue.clone(), &settings(&server, client_credentials()))
        .await
        .unwrap();

    let target = prepare_target(&client.get_album(ALBUM_ID).await.unwrap());

    assert_eq!(target.title, "abbey road");
    assert_eq!(target.artists, vec!["the beatles"]);
    assert_eq!(target.tracks.len(), 5);
    assert_eq!(target.tracks[2].name, "maxwell's silver hammer");
    assert_eq!(
        target.source_url.as_deref(),
        Some("https://open.spotify.com/album/0ETFjACtuP2ADo6LFhL6HN")
    );
    queue.shutdown();
}

#[tokio::test]
async fn test_pipeline_resolves_album_end_to_end() {
    let spotify = spotify_server().await;
    let musicbrainz = MockMusicBrainz::builder()
        .search(|query| {
            if query.contains("release:abbey road") {
                MockResponse::Json(search_response(vec![release_json(
                    "rel-1",
                    "Abbey Road",
                    "The Beatles",
                    5,
                    "rg-1",
                )]))
            } else {
                MockResponse::Json(search_response(vec![]))
            }
        })
        .start()
        .await;

    let (mb_client, mb_queue) = musicbrainz_client(&musicbrainz);
    let sp_queue = spotify_queue();
    let sp_client = SpotifyClient::connect(sp_queue.clone(), &settings(&spotify, client_credentials()))
        .await
        .unwrap();

    let pipeline = Pipeline::new(
        sp_client,
        Matcher::new(mb_client, Scorer::new()),
        mb_queue,
        sp_queue,
    );

    let result = pipeline.resolve_album(ALBUM_ID).await.unwrap();
    assert_eq!(result.release_id(), Some("rel-1"));
    assert_eq!(result.release_group_id(), Some("rg-1"));

    // The source URL lookup comes first and finds nothing
    let paths: Vec<_> = musicbrainz.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(paths, vec!["/ws/2/url", "/ws/2/release"]);
    pipeline.shutdown();
}
