//! Error types for sbm-match
//!
//! "No match" and "low confidence" are not errors; they are carried by
//! [`crate::models::MatchResult`]. These variants cover configuration,
//! transport, upstream status and response-shape failures.

use thiserror::Error;

/// External service a failure came from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    MusicBrainz,
    Spotify,
}

impl std::fmt::Display for Service {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Service::MusicBrainz => write!(f, "MusicBrainz"),
            Service::Spotify => write!(f, "Spotify"),
        }
    }
}

/// Main error type for sbm-match
#[derive(Debug, Error)]
pub enum MatchError {
    /// sbm-common error (configuration, I/O)
    #[error(transparent)]
    Common(#[from] sbm_common::Error),

    /// Network-level failure of a queued request
    #[error("Transport error on {queue} queue: {source}")]
    Transport {
        queue: String,
        #[source]
        source: reqwest::Error,
    },

    /// Non-success HTTP status from an external service
    #[error("{service} API returned {status} for {context}")]
    Upstream {
        service: Service,
        status: u16,
        context: String,
    },

    /// Response body did not have the expected shape
    #[error("Malformed {service} response for {context}: {detail}")]
    MalformedResponse {
        service: Service,
        context: String,
        detail: String,
    },

    /// Queue driver has stopped; the request was never answered
    #[error("Request queue '{0}' is closed")]
    QueueClosed(String),

    /// Request could not be built (bad URL, non-cloneable body)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl MatchError {
    /// Status code when this is an upstream (non-2xx) failure
    pub fn upstream_status(&self) -> Option<u16> {
        match self {
            MatchError::Upstream { status, .. } => Some(*status),
            _ => None,
        }
    }
}

/// Result type for sbm-match operations
pub type Result<T> = std::result::Result<T, MatchError>;
