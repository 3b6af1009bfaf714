//! Spotify (source catalog) access and target normalization

pub mod client;
pub mod normalize;

pub use client::{SpotifyAlbum, SpotifyClient};
pub use normalize::{prepare_target, strip_string};
