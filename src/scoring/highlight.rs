use crate::error::{Error, Result};
use crate::scoring::{ScoreInputs, Scores, HOT_RECENT_WEEKS, HOT_STAR_THRESH};
use crate::scoring::{MAT_COMMITS_REF, MAT_CONTRIB_REF, MAT_RELEASES_REF};
use serde::Serialize;

/// Which dimension produced the highlight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightKind {
    Popularity,
    Hotness,
    Activity,
    Maturity,
}

/// Maturity's strongest sub-signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MaturityComponent {
    Commits,
    Contributors,
    Releases,
}

/// Narrative one-liner for the repository's strongest dimension.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Highlight {
    #[serde(rename = "type")]
    pub kind: HighlightKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<MaturityComponent>,
}

/// Build the highlight for the best-scoring dimension that yields one.
///
/// Dimensions are tried in descending score order (ties keep the
/// popularity, hotness, activity, maturity declaration order). Hotness may
/// decline when nothing is actually moving; the other three always produce.
pub fn select_highlight(scores: &Scores, inputs: &ScoreInputs) -> Result<Highlight> {
    let mut dims = [
        (HighlightKind::Popularity, scores.p),
        (HighlightKind::Hotness, scores.h),
        (HighlightKind::Activity, scores.a),
        (HighlightKind::Maturity, scores.m),
    ];
    dims.sort_by(|a, b| b.1.cmp(&a.1));

    for (kind, _) in dims {
        let built = match kind {
            HighlightKind::Popularity => Some(popularity_highlight(inputs)),
            HighlightKind::Hotness => hotness_highlight(inputs),
            HighlightKind::Activity => Some(activity_highlight(inputs)),
            HighlightKind::Maturity => Some(maturity_highlight(inputs)),
        };
        if let Some(highlight) = built {
            return Ok(highlight);
        }
    }

    Err(Error::HighlightUnavailable)
}

fn popularity_highlight(inputs: &ScoreInputs) -> Highlight {
    Highlight {
        kind: HighlightKind::Popularity,
        message: format!(
            "starred by {} users and forked {} times",
            fmt_count(inputs.stargazers),
            fmt_count(inputs.forks),
        ),
        component: None,
    }
}

/// Hotness only speaks when something is moving: a recent push, an
/// above-average commit pace, a real commit burst, or a star base that makes
/// momentum meaningful.
fn hotness_highlight(inputs: &ScoreInputs) -> Option<Highlight> {
    let ratio = inputs.commit_ratio();
    let recent = inputs.recent_commits();

    let message = if inputs.weeks_since_push <= 1.0 {
        "pushed within the last week".to_string()
    } else if ratio >= 1.2 {
        format!("commit pace {}x the yearly average", trim1(ratio))
    } else if recent > HOT_RECENT_WEEKS as i64 {
        format!("{} commits in the last four weeks", fmt_count(recent))
    } else if inputs.stargazers >= HOT_STAR_THRESH {
        format!("gaining traction at {} stars", fmt_count(inputs.stargazers))
    } else {
        return None;
    };

    Some(Highlight {
        kind: HighlightKind::Hotness,
        message,
        component: None,
    })
}

fn activity_highlight(inputs: &ScoreInputs) -> Highlight {
    let weeks = inputs.active_weeks().to_string();
    Highlight {
        kind: HighlightKind::Activity,
        message: format!(
            "{} commits across {} this year",
            fmt_count(inputs.annual_commits()),
            pluralize(&weeks, "active week", "active weeks"),
        ),
        component: None,
    }
}

fn maturity_highlight(inputs: &ScoreInputs) -> Highlight {
    let component = maturity_component(inputs);
    let age = fmt_age(inputs.age_weeks);

    let message = match component {
        MaturityComponent::Commits => {
            format!("{} commits over {}", fmt_count(inputs.commits), age)
        }
        MaturityComponent::Contributors => {
            format!("built by {} contributors", fmt_count(inputs.contributors))
        }
        MaturityComponent::Releases => {
            format!("{} releases over {}", fmt_count(inputs.releases), age)
        }
    };

    Highlight {
        kind: HighlightKind::Maturity,
        message,
        component: Some(component),
    }
}

/// The sub-signal furthest above its reference; ties resolve in the
/// commits, contributors, releases order.
fn maturity_component(inputs: &ScoreInputs) -> MaturityComponent {
    let ratios = [
        (
            MaturityComponent::Commits,
            inputs.commits as f64 / MAT_COMMITS_REF,
        ),
        (
            MaturityComponent::Contributors,
            inputs.contributors as f64 / MAT_CONTRIB_REF,
        ),
        (
            MaturityComponent::Releases,
            inputs.releases as f64 / MAT_RELEASES_REF,
        ),
    ];

    let mut best = ratios[0];
    for candidate in &ratios[1..] {
        if candidate.1 > best.1 {
            best = *candidate;
        }
    }
    best.0
}

/// Compact count: `50000 -> "50k"`, `1500 -> "1.5k"`, `1000000 -> "1m"`,
/// `999 -> "999"`. One decimal, trailing zero trimmed.
pub fn fmt_count(n: i64) -> String {
    if n >= 1_000_000 {
        format!("{}m", trim1(n as f64 / 1_000_000.0))
    } else if n >= 1_000 {
        format!("{}k", trim1(n as f64 / 1_000.0))
    } else {
        n.to_string()
    }
}

/// Age buckets: >=5y whole years, >=2y fractional years, >=1y and >=8w
/// months, else weeks.
pub fn fmt_age(weeks: f64) -> String {
    if weeks >= 260.0 {
        let years = (weeks / 52.0).round() as i64;
        format!("{years} years")
    } else if weeks >= 104.0 {
        format!("{} years", trim1(weeks / 52.0))
    } else if weeks >= 8.0 {
        let months = (weeks / 4.345).round() as i64;
        format!("{months} months")
    } else {
        let rounded = weeks.round() as i64;
        let rendered = rounded.to_string();
        pluralize(&rendered, "week", "weeks")
    }
}

/// One decimal with a trailing `.0` trimmed: `1.0 -> "1"`, `1.5 -> "1.5"`.
fn trim1(value: f64) -> String {
    let rendered = format!("{value:.1}");
    rendered
        .strip_suffix(".0")
        .map(str::to_string)
        .unwrap_or(rendered)
}

/// `"1"` takes the singular unit, everything else the plural.
fn pluralize(rendered: &str, singular: &str, plural: &str) -> String {
    if rendered == "1" {
        format!("{rendered} {singular}")
    } else {
        format!("{rendered} {plural}")
    }
}
