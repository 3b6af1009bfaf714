//! MusicBrainz (reference catalog) access: query building, client, search

pub mod client;
pub mod query;
pub mod search;

pub use client::MusicBrainzClient;
pub use query::{derive_parameters, Modifier, QueryParameter, SearchStage};
pub use search::{RelaxationSearch, Resolution, SearchOutcome};
