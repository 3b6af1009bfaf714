//! Batch evaluation against a fixture of known matches
//!
//! Fixture format: a JSON object of categories, each a list of
//! `[label, spotify_id, expected_release_group_id, expected_release_id]`
//! where the last element may also be a list of acceptable release ids.
//!
//! All cases of a category run concurrently; the shared queues keep the
//! request rate in check. A case earns full credit for an expected release,
//! half credit for the right release group only.

use crate::error::Result;
use crate::models::MatchResult;
use crate::pipeline::AlbumResolver;
use futures::future::join_all;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::info;

/// Default minimum pass rate per category
pub const DEFAULT_THRESHOLD: f64 = 0.9;

/// Release id(s) accepted as correct
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum ExpectedRelease {
    One(String),
    AnyOf(Vec<String>),
}

impl ExpectedRelease {
    pub fn accepts(&self, release_id: &str) -> bool {
        match self {
            ExpectedRelease::One(id) => id == release_id,
            ExpectedRelease::AnyOf(ids) => ids.iter().any(|id| id == release_id),
        }
    }
}

impl fmt::Display for ExpectedRelease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExpectedRelease::One(id) => write!(f, "{}", id),
            ExpectedRelease::AnyOf(ids) => write!(f, "{}", ids.join(" | ")),
        }
    }
}

/// One fixture entry
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct EvaluationCase(
    pub String,
    pub String,
    pub String,
    pub ExpectedRelease,
);

impl EvaluationCase {
    pub fn label(&self) -> &str {
        &self.0
    }

    pub fn source_id(&self) -> &str {
        &self.1
    }

    pub fn expected_release_group(&self) -> &str {
        &self.2
    }

    pub fn expected_release(&self) -> &ExpectedRelease {
        &self.3
    }
}

/// Categories in name order
pub type Fixture = BTreeMap<String, Vec<EvaluationCase>>;

pub fn load_fixture(path: &Path) -> Result<Fixture> {
    let content = std::fs::read_to_string(path).map_err(sbm_common::Error::from)?;
    serde_json::from_str(&content).map_err(|e| {
        sbm_common::Error::InvalidInput(format!("Fixture {}: {}", path.display(), e)).into()
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Success,
    Partial,
    Failed,
}

impl Grade {
    pub fn credit(self) -> f64 {
        match self {
            Grade::Success => 1.0,
            Grade::Partial => 0.5,
            Grade::Failed => 0.0,
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Grade::Success => write!(f, "SUCCESS"),
            Grade::Partial => write!(f, "PARTIAL"),
            Grade::Failed => write!(f, "FAILED!"),
        }
    }
}

/// Outcome of one case
#[derive(Debug, Clone)]
pub struct CaseReport {
    pub case: EvaluationCase,
    pub grade: Grade,
    /// Matched release id, or the error message
    pub actual: String,
}

impl CaseReport {
    pub fn format_failure(&self) -> String {
        format!(
            "{} (https://open.spotify.com/album/{}):\n    Expected: {}\n    Actual: {}",
            self.case.label(),
            self.case.source_id(),
            self.case.expected_release(),
            self.actual
        )
    }
}

/// Grade one case from its match outcome
pub fn grade(case: &EvaluationCase, outcome: &Result<MatchResult>) -> CaseReport {
    let (grade, actual) = match outcome {
        Err(e) => (Grade::Failed, e.to_string()),
        Ok(MatchResult::Error { message }) => (Grade::Failed, message.clone()),
        Ok(MatchResult::Success {
            release_id,
            release_group_id,
            ..
        }) => {
            let grade = if case.expected_release().accepts(release_id) {
                Grade::Success
            } else if release_group_id == case.expected_release_group() {
                Grade::Partial
            } else {
                Grade::Failed
            };
            (grade, release_id.clone())
        }
    };

    CaseReport {
        case: case.clone(),
        grade,
        actual,
    }
}

/// Reports of one category, in fixture order
#[derive(Debug, Clone)]
pub struct CategoryReport {
    pub category: String,
    pub cases: Vec<CaseReport>,
}

impl CategoryReport {
    /// Summed credit (partial matches count half)
    pub fn credit(&self) -> f64 {
        self.cases.iter().map(|c| c.grade.credit()).sum()
    }

    /// Share of cases matched to an expected release
    pub fn pass_rate(&self) -> f64 {
        if self.cases.is_empty() {
            return 1.0;
        }
        let passed = self.cases.iter().filter(|c| c.grade == Grade::Success).count();
        passed as f64 / self.cases.len() as f64
    }

    pub fn failures(&self) -> impl Iterator<Item = &CaseReport> {
        self.cases.iter().filter(|c| c.grade != Grade::Success)
    }

    pub fn meets(&self, threshold: f64) -> bool {
        self.pass_rate() >= threshold
    }
}

/// Run every case of one category concurrently
pub async fn evaluate_category<R>(resolver: &R, category: &str, cases: &[EvaluationCase]) -> CategoryReport
where
    R: AlbumResolver + ?Sized,
{
    let outcomes = join_all(cases.iter().map(|case| resolver.resolve_album(case.source_id()))).await;

    let total = cases.len();
    let mut credit = 0.0;
    let mut reports = Vec::with_capacity(total);

    for (i, (case, outcome)) in cases.iter().zip(outcomes.iter()).enumerate() {
        let report = grade(case, outcome);
        credit += report.grade.credit();
        info!(
            "{} [{}/{}] ({:.2}): {}",
            report.grade,
            i + 1,
            total,
            credit / (i + 1) as f64,
            case.label()
        );
        reports.push(report);
    }

    CategoryReport {
        category: category.to_string(),
        cases: reports,
    }
}

/// Run every category of a fixture, one category at a time
pub async fn evaluate<R>(resolver: &R, fixture: &Fixture) -> Vec<CategoryReport>
where
    R: AlbumResolver + ?Sized,
{
    let mut reports = Vec::with_capacity(fixture.len());
    for (category, cases) in fixture {
        info!(category = %category, cases = cases.len(), "Evaluating category");
        reports.push(evaluate_category(resolver, category, cases).await);
    }
    reports
}
