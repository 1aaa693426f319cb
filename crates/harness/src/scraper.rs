//! Results scraping - turning the rendered test page into outcomes
//!
//! The page reports its results inside one container element:
//!
//! ```html
//! <div id="results">
//!   <div>Testing: math</div>
//!   <div>✅ PASS: angle wraps</div>
//!   <div>❌ FAIL: damage rounding</div>
//!   <div>All tests completed</div>
//! </div>
//! ```
//!
//! Each `<div>`-wrapped segment is classified by marker substring, first
//! match wins: pass, then fail-or-error, then progress. Anything else is
//! ignored.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{HarnessError, HarnessResult};

pub const PASS_MARKER: &str = "✅ PASS:";
pub const FAIL_MARKER: &str = "❌ FAIL:";
pub const ERROR_MARKER: &str = "💥 ERROR:";
pub const PROGRESS_MARKERS: [&str; 2] = ["Testing:", "All tests completed"];

static CONTAINER_OPEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)<div\b[^>]*?\sid\s*=\s*(?:"results"|'results')[^>]*>"#)
        .expect("container pattern is valid")
});

static DIV_TAG: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<(/?)div\b[^>]*>").expect("div tag pattern is valid"));

static COMMENT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").expect("comment pattern is valid"));

static DIV_OPEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)<div\b[^>]*>").expect("div open pattern is valid"));

static DIV_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)</div\s*>").expect("div close pattern is valid"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeStatus {
    Pass,
    Fail,
    Error,
}

impl OutcomeStatus {
    pub fn is_failure(&self) -> bool {
        !matches!(self, OutcomeStatus::Pass)
    }
}

/// One recognized outcome line, in page order
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestOutcome {
    pub status: OutcomeStatus,
    pub message: String,
}

/// A classified segment of the results container
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultLine {
    Outcome(TestOutcome),
    /// Progress or context (`Testing:`, completion); shown, never counted
    Progress(String),
}

impl ResultLine {
    /// The line as it appeared on the page
    pub fn text(&self) -> &str {
        match self {
            ResultLine::Outcome(outcome) => &outcome.message,
            ResultLine::Progress(text) => text,
        }
    }
}

/// Aggregate counts for one run. Errors fold into `failed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub passed: usize,
    pub failed: usize,
}

impl RunSummary {
    pub fn from_outcomes<'a>(outcomes: impl IntoIterator<Item = &'a TestOutcome>) -> Self {
        outcomes
            .into_iter()
            .fold(Self::default(), |mut summary, outcome| {
                if outcome.status.is_failure() {
                    summary.failed += 1;
                } else {
                    summary.passed += 1;
                }
                summary
            })
    }

    pub fn from_lines(lines: &[ResultLine]) -> Self {
        Self::from_outcomes(lines.iter().filter_map(|line| match line {
            ResultLine::Outcome(outcome) => Some(outcome),
            ResultLine::Progress(_) => None,
        }))
    }

    pub fn total(&self) -> usize {
        self.passed + self.failed
    }

    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// Extracts test outcomes from rendered result markup
#[derive(Debug, Clone, Copy, Default)]
pub struct ResultScraper;

impl ResultScraper {
    pub fn new() -> Self {
        Self
    }

    /// Count the outcomes in `html`.
    pub fn parse(&self, html: &str) -> HarnessResult<RunSummary> {
        self.scrape(html).map(|lines| RunSummary::from_lines(&lines))
    }

    /// Classify every segment of the results container, in page order.
    pub fn scrape(&self, html: &str) -> HarnessResult<Vec<ResultLine>> {
        let uncommented = COMMENT.replace_all(html, "");
        let content = results_container(&uncommented)?;

        Ok(DIV_OPEN
            .split(content)
            .map(|segment| DIV_CLOSE.replace_all(segment, ""))
            .filter_map(|segment| classify(segment.trim()))
            .collect())
    }
}

/// Inner markup of the first results container.
///
/// The container ends at its matching `</div>`, so nested line `div`s are
/// kept inside it.
fn results_container(html: &str) -> HarnessResult<&str> {
    let open = CONTAINER_OPEN.find(html).ok_or_else(|| {
        HarnessError::MalformedResults("no <div id=\"results\"> element".to_string())
    })?;

    let body = &html[open.end()..];
    let mut depth = 1usize;

    for tag in DIV_TAG.captures_iter(body) {
        let closing = tag.get(1).is_some_and(|slash| !slash.as_str().is_empty());
        let whole = tag.get(0).map(|m| m.as_str()).unwrap_or_default();
        if !closing && whole.ends_with("/>") {
            // Self-closing, never opens a block.
            continue;
        }
        if closing {
            depth -= 1;
            if depth == 0 {
                let end = tag.get(0).map(|m| m.start()).unwrap_or(body.len());
                return Ok(&body[..end]);
            }
        } else {
            depth += 1;
        }
    }

    Err(HarnessError::MalformedResults(
        "results container is never closed".to_string(),
    ))
}

fn classify(segment: &str) -> Option<ResultLine> {
    if segment.is_empty() {
        return None;
    }

    let outcome = |status| {
        Some(ResultLine::Outcome(TestOutcome {
            status,
            message: segment.to_string(),
        }))
    };

    if segment.contains(PASS_MARKER) {
        outcome(OutcomeStatus::Pass)
    } else if segment.contains(FAIL_MARKER) {
        outcome(OutcomeStatus::Fail)
    } else if segment.contains(ERROR_MARKER) {
        outcome(OutcomeStatus::Error)
    } else if PROGRESS_MARKERS.iter().any(|m| segment.contains(m)) {
        Some(ResultLine::Progress(segment.to_string()))
    } else {
        None
    }
}
