//! Spotify album → [`TargetMetadata`]

use super::client::SpotifyAlbum;
use crate::models::{TargetMetadata, TargetTrack};
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static REMASTER_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\(remaster(ed)?\)|\[remaster(ed)?\]").expect("valid regex"));

const ALBUM_URL_PREFIX: &str = "https://open.spotify.com/album/";

/// Lowercase, strip diacritics and remaster tags, collapse whitespace
pub fn strip_string(input: &str) -> String {
    let decomposed: String = input
        .to_lowercase()
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect();

    let untagged = REMASTER_TAG.replace_all(&decomposed, "");
    untagged.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build the matching target from a fetched album
///
/// The release date is kept verbatim; the source URL falls back to the
/// canonical album URL when the response omits it.
pub fn prepare_target(album: &SpotifyAlbum) -> TargetMetadata {
    let artists = album.artists.iter().map(|a| strip_string(&a.name)).collect();
    let tracks = album
        .tracks
        .items
        .iter()
        .map(|t| TargetTrack::new(strip_string(&t.name), t.duration_ms))
        .collect();

    let source_url = album
        .external_urls
        .spotify
        .clone()
        .unwrap_or_else(|| format!("{}{}", ALBUM_URL_PREFIX, album.id));

    let target = TargetMetadata::new(strip_string(&album.name), artists, tracks)
        .with_source_url(source_url);

    match album.release_date.as_deref() {
        Some(date) if !date.trim().is_empty() => target.with_release_date(date),
        _ => target,
    }
}
