//! Candidate scoring
//!
//! Additive score of one candidate release against the target album:
//!
//! | Term           | Points                                              |
//! |----------------|-----------------------------------------------------|
//! | Title          | 40 on case-insensitive equality                     |
//! | Artists        | 30 x share of target artists credited               |
//! | Track count    | 20, minus 5 per track of difference (floor 0)       |
//! | Release date   | 30 x proximity multiplier of the month difference   |
//! | Country        | 10 worldwide/unknown, 5 US or GB                    |
//! | Disambiguation | 10 when absent                                      |
//! | Track list     | round(40 x overlap), only with a full track list    |
//!
//! A track-list overlap of 0.8 or more locks the score to at least 95.

use crate::models::{EnrichedRelease, ReleaseTrack, ScoredCandidate, TargetMetadata, TargetTrack};
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use tracing::debug;

pub const TITLE_POINTS: f64 = 40.0;
pub const ARTIST_POINTS: f64 = 30.0;
pub const TRACK_COUNT_POINTS: f64 = 20.0;
pub const TRACK_COUNT_PENALTY: f64 = 5.0;
pub const RELEASE_DATE_POINTS: f64 = 30.0;
pub const WORLDWIDE_COUNTRY_POINTS: f64 = 10.0;
pub const MAJOR_MARKET_POINTS: f64 = 5.0;
pub const PREFERRED_COUNTRY_POINTS: f64 = 5.0;
pub const DISAMBIGUATION_POINTS: f64 = 10.0;
pub const TRACK_LIST_POINTS: f64 = 40.0;

/// Overlap ratio at which the high-confidence floor applies
pub const HIGH_CONFIDENCE_OVERLAP: f64 = 0.8;
pub const HIGH_CONFIDENCE_FLOOR: f64 = 95.0;

const WORLDWIDE: &str = "XW";
const MAJOR_MARKETS: &[&str] = &["US", "GB"];

static PARENTHESIZED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\(.*?\)").expect("valid regex"));
static BRACKETED: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[.*?\]").expect("valid regex"));
static FEATURING: Lazy<Regex> = Lazy::new(|| Regex::new(r"\bfeat\.?.*").expect("valid regex"));
static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9\s]").expect("valid regex"));
static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid regex"));

/// Per-term contributions of one score
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreBreakdown {
    pub title: f64,
    pub artists: f64,
    pub track_count: f64,
    pub release_date: f64,
    pub country: f64,
    pub disambiguation: f64,
    pub track_list: f64,
    /// Track-list overlap ratio, when both track lists were available
    pub overlap: Option<f64>,
}

impl ScoreBreakdown {
    /// Sum of the terms with the high-confidence floor applied
    pub fn total(&self) -> f64 {
        let sum = self.title
            + self.artists
            + self.track_count
            + self.release_date
            + self.country
            + self.disambiguation
            + self.track_list;

        match self.overlap {
            Some(ratio) if ratio >= HIGH_CONFIDENCE_OVERLAP => sum.max(HIGH_CONFIDENCE_FLOOR),
            _ => sum,
        }
    }
}

/// Scores candidates against a target
#[derive(Debug, Clone, Default)]
pub struct Scorer {
    preferred_country: Option<String>,
}

impl Scorer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also award points to releases from `country` (ISO code, any case)
    pub fn with_preferred_country(country: Option<String>) -> Self {
        Self {
            preferred_country: country.map(|c| c.trim().to_uppercase()).filter(|c| !c.is_empty()),
        }
    }

    pub fn preferred_country(&self) -> Option<&str> {
        self.preferred_country.as_deref()
    }

    pub fn score(&self, release: &EnrichedRelease, target: &TargetMetadata) -> f64 {
        self.breakdown(release, target).total()
    }

    pub fn breakdown(&self, release: &EnrichedRelease, target: &TargetMetadata) -> ScoreBreakdown {
        let candidate = &release.release;
        let overlap = release
            .tracks
            .as_deref()
            .and_then(|tracks| track_overlap_ratio(&target.tracks, tracks));

        ScoreBreakdown {
            title: title_score(&candidate.title, &target.title),
            artists: artist_score(candidate.artist_names(), &target.artists),
            track_count: track_count_score(candidate.track_count as usize, target.tracks.len()),
            release_date: release_date_score(
                release.first_release_date.as_deref(),
                target.release_date.as_deref(),
            ),
            country: self.country_score(candidate.country.as_deref()),
            disambiguation: disambiguation_score(candidate.disambiguation.as_deref()),
            track_list: overlap
                .filter(|ratio| *ratio > 0.0)
                .map(|ratio| (TRACK_LIST_POINTS * ratio).round())
                .unwrap_or(0.0),
            overlap,
        }
    }

    fn country_score(&self, country: Option<&str>) -> f64 {
        let fixed = country_score(country);
        if fixed > 0.0 {
            return fixed;
        }

        match (country, self.preferred_country.as_deref()) {
            (Some(country), Some(preferred)) if country.eq_ignore_ascii_case(preferred) => {
                PREFERRED_COUNTRY_POINTS
            }
            _ => 0.0,
        }
    }

    /// Score every release and sort best first
    ///
    /// The sort is stable, so equal scores keep catalog order.
    pub fn rank(&self, releases: Vec<EnrichedRelease>, target: &TargetMetadata) -> Vec<ScoredCandidate> {
        let mut scored: Vec<ScoredCandidate> = releases
            .into_iter()
            .map(|release| {
                let breakdown = self.breakdown(&release, target);
                let score = breakdown.total();
                debug!(
                    release_id = %release.release.id,
                    title = %release.release.title,
                    score,
                    ?breakdown,
                    "Scored candidate"
                );
                ScoredCandidate {
                    candidate: release.release,
                    score,
                }
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored
    }
}

/// Score with no preferred country
pub fn score(release: &EnrichedRelease, target: &TargetMetadata) -> f64 {
    Scorer::new().score(release, target)
}

pub fn title_score(candidate_title: &str, target_title: &str) -> f64 {
    if candidate_title.to_lowercase() == target_title.to_lowercase() {
        TITLE_POINTS
    } else {
        0.0
    }
}

/// Share of target artists found among the credited names
pub fn artist_score<'a>(credited: impl Iterator<Item = &'a str>, target_artists: &[String]) -> f64 {
    if target_artists.is_empty() {
        return 0.0;
    }

    let credited: HashSet<String> = credited.map(str::to_lowercase).collect();
    let matched = target_artists
        .iter()
        .filter(|artist| credited.contains(&artist.to_lowercase()))
        .count();

    ARTIST_POINTS * matched as f64 / target_artists.len() as f64
}

pub fn track_count_score(candidate_count: usize, target_count: usize) -> f64 {
    let diff = candidate_count.abs_diff(target_count) as f64;
    (TRACK_COUNT_POINTS - TRACK_COUNT_PENALTY * diff).max(0.0)
}

/// Year and month of a `YYYY-MM[-DD]` date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearMonth {
    pub year: i32,
    pub month: i32,
}

impl YearMonth {
    /// `None` when the year or month is missing or not numeric
    pub fn parse(date: &str) -> Option<Self> {
        let mut parts = date.trim().split('-');
        let year = parts.next()?.parse().ok()?;
        let month = parts.next()?.parse().ok()?;
        Some(Self { year, month })
    }

    pub fn months_between(self, other: YearMonth) -> u32 {
        ((self.year - other.year) * 12 + (self.month - other.month)).unsigned_abs()
    }
}

/// Proximity multiplier for a difference in months
pub fn date_multiplier(month_delta: u32) -> f64 {
    match month_delta {
        0..=3 => 1.0,
        4..=6 => 0.8,
        7..=12 => 0.5,
        13..=24 => 0.2,
        _ => 0.0,
    }
}

/// Points for release-date proximity; 0 when either date lacks a month
pub fn release_date_score(first_release_date: Option<&str>, target_date: Option<&str>) -> f64 {
    let (Some(candidate), Some(target)) = (
        first_release_date.and_then(YearMonth::parse),
        target_date.and_then(YearMonth::parse),
    ) else {
        return 0.0;
    };

    RELEASE_DATE_POINTS * date_multiplier(candidate.months_between(target))
}

/// Fixed country rule: worldwide or unknown beats a major market
pub fn country_score(country: Option<&str>) -> f64 {
    match country {
        None | Some(WORLDWIDE) => WORLDWIDE_COUNTRY_POINTS,
        Some(c) if MAJOR_MARKETS.contains(&c) => MAJOR_MARKET_POINTS,
        Some(_) => 0.0,
    }
}

pub fn disambiguation_score(disambiguation: Option<&str>) -> f64 {
    match disambiguation {
        Some(d) if !d.trim().is_empty() => 0.0,
        _ => DISAMBIGUATION_POINTS,
    }
}

/// Canonical form of a track title for overlap comparison
///
/// Drops bracketed qualifiers and featured-artist suffixes, keeps only ASCII
/// letters, digits and single spaces.
pub fn normalize_track_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let stripped = PARENTHESIZED.replace_all(&lowered, "");
    let stripped = BRACKETED.replace_all(&stripped, "");
    let stripped = FEATURING.replace_all(&stripped, "");
    let stripped = NON_ALPHANUMERIC.replace_all(&stripped, "");
    WHITESPACE.replace_all(&stripped, " ").trim().to_string()
}

/// Matched normalized titles over the larger of the two title sets
///
/// `None` when either side has no tracks.
pub fn track_overlap_ratio(target: &[TargetTrack], release: &[ReleaseTrack]) -> Option<f64> {
    if target.is_empty() || release.is_empty() {
        return None;
    }

    let target_titles: HashSet<String> = target.iter().map(|t| normalize_track_title(&t.name)).collect();
    let release_titles: HashSet<String> =
        release.iter().map(|t| normalize_track_title(&t.title)).collect();

    let matches = target_titles.intersection(&release_titles).count();
    let size = target_titles.len().max(release_titles.len());

    Some(matches as f64 / size as f64)
}
