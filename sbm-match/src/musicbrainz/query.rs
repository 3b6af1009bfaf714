//! Lucene query assembly and search relaxation stages
//!
//! A search starts from a fixed base parameter sequence built from the
//! target. Each [`SearchStage`] deterministically derives the parameters to
//! send from that base; nothing is mutated between stages.

use crate::models::TargetMetadata;
use std::fmt;

pub const ARTIST: &str = "artist";
pub const RELEASE: &str = "release";
pub const FORMAT: &str = "format";
pub const STATUS: &str = "status";
pub const TRACKS: &str = "tracks";

const DIGITAL_MEDIA: &str = "digitalmedia";
const OFFICIAL: &str = "official";

/// Characters with meaning in the search syntax
const SPECIAL_CHARS: &[char] = &[
    '+', '-', '!', '(', ')', '{', '}', '[', ']', '^', '"', '~', '*', '?', ':', '\\', '/',
];

/// How a parameter value is wrapped in the query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Modifier {
    #[default]
    None,
    /// `"value"`
    Exact,
    /// `(value)~`
    Fuzzy,
}

/// One `name:value` clause of a search query
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameter {
    pub name: String,
    pub value: String,
    pub modifier: Modifier,
}

impl QueryParameter {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            modifier: Modifier::None,
        }
    }

    pub fn with_modifier(mut self, modifier: Modifier) -> Self {
        self.modifier = modifier;
        self
    }

    /// Render as a query clause with the value escaped
    pub fn clause(&self) -> String {
        let value = escape_value(&self.value);
        match self.modifier {
            Modifier::None => format!("{}:{}", self.name, value),
            Modifier::Exact => format!("{}:\"{}\"", self.name, value),
            Modifier::Fuzzy => format!("{}:({})~", self.name, value),
        }
    }
}

/// Backslash-escape query syntax characters
pub fn escape_value(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if SPECIAL_CHARS.contains(&c) {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

/// Join parameter clauses with `AND`
pub fn build_query(params: &[QueryParameter]) -> String {
    params
        .iter()
        .map(QueryParameter::clause)
        .collect::<Vec<_>>()
        .join(" AND ")
}

/// Base (strictest) parameter sequence for a target
pub fn base_parameters(target: &TargetMetadata) -> Vec<QueryParameter> {
    vec![
        QueryParameter::new(ARTIST, target.artists.join(" ")),
        QueryParameter::new(RELEASE, target.title.clone()),
        QueryParameter::new(FORMAT, DIGITAL_MEDIA),
        QueryParameter::new(STATUS, OFFICIAL),
        QueryParameter::new(TRACKS, target.tracks.len().to_string()),
    ]
}

/// Relaxation level of a search
///
/// Ordered: every stage is strictly looser than the ones before it, and
/// [`SearchStage::next`] only ever moves forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SearchStage {
    /// Base sequence, unmodified
    Base,
    /// `tracks` removed
    WithoutTrackCount,
    /// ...and `artist` fuzzy
    FuzzyArtist,
    /// ...and `release` fuzzy
    FuzzyRelease,
    /// ...and this many trailing parameters dropped
    Truncated(usize),
}

impl SearchStage {
    pub fn first() -> Self {
        SearchStage::Base
    }

    pub fn next(self) -> Self {
        match self {
            SearchStage::Base => SearchStage::WithoutTrackCount,
            SearchStage::WithoutTrackCount => SearchStage::FuzzyArtist,
            SearchStage::FuzzyArtist => SearchStage::FuzzyRelease,
            SearchStage::FuzzyRelease => SearchStage::Truncated(1),
            SearchStage::Truncated(popped) => SearchStage::Truncated(popped + 1),
        }
    }

    /// Relaxation level, 0 (base) to 4 (truncating)
    pub fn level(self) -> u8 {
        match self {
            SearchStage::Base => 0,
            SearchStage::WithoutTrackCount => 1,
            SearchStage::FuzzyArtist => 2,
            SearchStage::FuzzyRelease => 3,
            SearchStage::Truncated(_) => 4,
        }
    }

    /// Number of trailing parameters dropped
    pub fn pop_count(self) -> usize {
        match self {
            SearchStage::Truncated(popped) => popped,
            _ => 0,
        }
    }
}

impl fmt::Display for SearchStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SearchStage::Base => write!(f, "base"),
            SearchStage::WithoutTrackCount => write!(f, "without-track-count"),
            SearchStage::FuzzyArtist => write!(f, "fuzzy-artist"),
            SearchStage::FuzzyRelease => write!(f, "fuzzy-release"),
            SearchStage::Truncated(popped) => write!(f, "truncated-{}", popped),
        }
    }
}

/// Parameters to send at `stage`, derived from the base sequence
pub fn derive_parameters(base: &[QueryParameter], stage: SearchStage) -> Vec<QueryParameter> {
    let level = stage.level();

    let mut params: Vec<QueryParameter> = base
        .iter()
        .filter(|p| level < 1 || p.name != TRACKS)
        .cloned()
        .map(|p| {
            let fuzzy = (level >= 2 && p.name == ARTIST) || (level >= 3 && p.name == RELEASE);
            if fuzzy {
                p.with_modifier(Modifier::Fuzzy)
            } else {
                p
            }
        })
        .collect();

    params.truncate(params.len().saturating_sub(stage.pop_count()));
    params
}
