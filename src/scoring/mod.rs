//! PHAM scoring: Popularity, Hotness, Activity, Maturity.
//!
//! Pure arithmetic over a merged view of API metadata and scraped counters.
//! Scores are unbounded integers tuned for relative ranking, not calibrated
//! probabilities. The calibration constants are frozen; tests pin them.

pub mod highlight;

pub use highlight::{select_highlight, Highlight, HighlightKind, MaturityComponent};

use serde::Serialize;

pub const POP_STAR_REF: f64 = 50_000.0;
pub const POP_SUB_REF: f64 = 5_000.0;
pub const POP_FORK_REF: f64 = 10_000.0;
pub const HOT_RECENT_WEEKS: f64 = 4.0;
pub const HOT_HALF_LIFE: f64 = 4.0;
pub const HOT_DECAY_WEEKS: f64 = 250.0;
pub const HOT_YOUTH_RAMP: f64 = 26.0;
pub const HOT_YOUTH_FLOOR: f64 = 0.35;
pub const HOT_POP_SCALE: f64 = 400.0;
pub const HOT_STAR_THRESH: i64 = 400;
pub const ACT_ANNUAL_REF: f64 = 1_200.0;
pub const MAT_COMMITS_REF: f64 = 5_000.0;
pub const MAT_RELEASES_REF: f64 = 100.0;
pub const MAT_CONTRIB_REF: f64 = 200.0;
pub const MAT_AGE_REF_WEEKS: f64 = 208.0;
pub const MAT_SIZE_REF: f64 = 500.0;

/// Everything the engine needs, already merged and time-derived.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScoreInputs {
    pub stargazers: i64,
    pub subscribers: i64,
    pub forks: i64,
    /// Repository size in megabytes (`api.size / 1000`).
    pub size_mb: f64,
    pub age_weeks: f64,
    pub weeks_since_push: f64,
    /// Weekly commit counts, oldest first, up to 52 entries.
    pub participation_all: Vec<i64>,
    pub commits: i64,
    pub releases: i64,
    pub contributors: i64,
}

impl ScoreInputs {
    /// Commits in the last four full weeks.
    pub fn recent_commits(&self) -> i64 {
        let len = self.participation_all.len();
        let start = len.saturating_sub(HOT_RECENT_WEEKS as usize);
        self.participation_all[start..].iter().sum()
    }

    /// Commits over the whole participation window.
    pub fn annual_commits(&self) -> i64 {
        self.participation_all.iter().sum()
    }

    /// Weeks with at least one commit.
    pub fn active_weeks(&self) -> i64 {
        self.participation_all.iter().filter(|&&w| w > 0).count() as i64
    }

    /// Recent commit pace relative to the yearly average.
    pub fn commit_ratio(&self) -> f64 {
        let annual = self.annual_commits();
        let avg_weekly = if annual == 0 {
            0.0
        } else {
            annual as f64 / 52.0
        };
        let baseline = (avg_weekly * HOT_RECENT_WEEKS).max(1.0);
        self.recent_commits() as f64 / baseline
    }
}

/// The four scores. The average deliberately excludes hotness.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Scores {
    pub p: i64,
    pub h: i64,
    pub a: i64,
    pub m: i64,
}

impl Scores {
    pub fn average(&self) -> i64 {
        ((self.p + self.a + self.m) as f64 / 3.0).round() as i64
    }
}

/// `log(1+v) / log(1+ref)`, or `log(1+v)` when the reference is degenerate.
pub fn log_norm(value: f64, reference: f64) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    if reference <= 0.0 {
        return (1.0 + value).ln();
    }
    (1.0 + value).ln() / (1.0 + reference).ln()
}

pub fn lin_norm(value: f64, reference: f64) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    value / reference.max(f64::EPSILON)
}

pub fn pow_norm(value: f64, reference: f64, exponent: f64, cap: Option<f64>) -> f64 {
    if value <= 0.0 {
        return 0.0;
    }
    let mut base = value / reference.max(1.0);
    if let Some(cap) = cap {
        base = base.min(cap);
    }
    base.powf(exponent)
}

/// Sublinear below the size reference, saturated at 1 above it.
pub fn size_norm(size_mb: f64) -> f64 {
    if size_mb <= 0.0 {
        return 0.0;
    }
    if size_mb <= MAT_SIZE_REF {
        (size_mb / MAT_SIZE_REF).powf(0.7)
    } else {
        1.0
    }
}

pub fn popularity(inputs: &ScoreInputs) -> f64 {
    100.0
        * (6.0 * log_norm(inputs.stargazers as f64, POP_STAR_REF)
            + 2.0 * log_norm(inputs.subscribers as f64, POP_SUB_REF)
            + 2.0 * log_norm(inputs.forks as f64, POP_FORK_REF))
}

pub fn hotness(inputs: &ScoreInputs) -> f64 {
    let recency = 0.5_f64.powf(inputs.weeks_since_push / HOT_HALF_LIFE);
    let pop_momentum = (popularity(inputs) / HOT_POP_SCALE.max(1.0)).min(1.0);

    let ratio = inputs.commit_ratio();
    let momentum = if ratio > 0.0 { (1.0 + ratio).ln() } else { 0.0 };

    let age_penalty = 1.0 / (1.0 + inputs.age_weeks / HOT_DECAY_WEEKS);

    // Young repos spike on any commit burst; damp until the ramp is climbed.
    let youth_damping = if inputs.age_weeks <= 0.0 {
        HOT_YOUTH_FLOOR
    } else {
        (inputs.age_weeks / HOT_YOUTH_RAMP.max(1.0)).clamp(HOT_YOUTH_FLOOR, 1.0)
    };

    100.0 * (1.5 * recency + 1.5 * momentum + 7.0 * pop_momentum) * age_penalty * youth_damping
}

pub fn activity(inputs: &ScoreInputs) -> f64 {
    100.0
        * (6.5 * pow_norm(inputs.annual_commits() as f64, ACT_ANNUAL_REF, 0.6, None)
            + 3.5 * lin_norm(inputs.active_weeks() as f64, 52.0))
}

pub fn maturity(inputs: &ScoreInputs) -> f64 {
    100.0
        * (3.5 * pow_norm(inputs.commits as f64, MAT_COMMITS_REF, 1.2, Some(3.5))
            + 2.5 * pow_norm(inputs.contributors as f64, MAT_CONTRIB_REF, 1.15, Some(3.0))
            + 2.0 * pow_norm(inputs.releases as f64, MAT_RELEASES_REF, 1.1, Some(3.0))
            + 1.5 * log_norm(inputs.age_weeks, MAT_AGE_REF_WEEKS)
            + 0.5 * size_norm(inputs.size_mb))
}

/// Compute all four scores.
pub fn score(inputs: &ScoreInputs) -> Scores {
    Scores {
        p: popularity(inputs).round() as i64,
        h: hotness(inputs).round() as i64,
        a: activity(inputs).round() as i64,
        m: maturity(inputs).round() as i64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_inputs() -> ScoreInputs {
        // Every component sits exactly at its reference.
        ScoreInputs {
            stargazers: 50_000,
            subscribers: 5_000,
            forks: 10_000,
            size_mb: 500.0,
            age_weeks: 208.0,
            weeks_since_push: 0.0,
            participation_all: vec![1_200 / 52; 52],
            commits: 5_000,
            releases: 100,
            contributors: 200,
        }
    }

    #[test]
    fn test_calibration_constants_are_frozen() {
        assert_eq!(POP_STAR_REF, 50_000.0);
        assert_eq!(POP_SUB_REF, 5_000.0);
        assert_eq!(POP_FORK_REF, 10_000.0);
        assert_eq!(HOT_RECENT_WEEKS, 4.0);
        assert_eq!(HOT_HALF_LIFE, 4.0);
        assert_eq!(HOT_DECAY_WEEKS, 250.0);
        assert_eq!(HOT_YOUTH_RAMP, 26.0);
        assert_eq!(HOT_YOUTH_FLOOR, 0.35);
        assert_eq!(HOT_POP_SCALE, 400.0);
        assert_eq!(HOT_STAR_THRESH, 400);
        assert_eq!(ACT_ANNUAL_REF, 1_200.0);
        assert_eq!(MAT_COMMITS_REF, 5_000.0);
        assert_eq!(MAT_RELEASES_REF, 100.0);
        assert_eq!(MAT_CONTRIB_REF, 200.0);
        assert_eq!(MAT_AGE_REF_WEEKS, 208.0);
        assert_eq!(MAT_SIZE_REF, 500.0);
    }

    #[test]
    fn test_normalizers_zero_on_nonpositive_input() {
        assert_eq!(log_norm(0.0, 100.0), 0.0);
        assert_eq!(log_norm(-5.0, 100.0), 0.0);
        assert_eq!(lin_norm(0.0, 100.0), 0.0);
        assert_eq!(pow_norm(0.0, 100.0, 1.2, None), 0.0);
        assert_eq!(size_norm(0.0), 0.0);
    }

    #[test]
    fn test_normalizers_hit_one_at_reference() {
        assert!((log_norm(100.0, 100.0) - 1.0).abs() < 1e-12);
        assert!((lin_norm(52.0, 52.0) - 1.0).abs() < 1e-12);
        assert!((pow_norm(1_200.0, 1_200.0, 0.6, None) - 1.0).abs() < 1e-12);
        assert!((size_norm(500.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_pow_norm_cap() {
        // 10x the reference with cap 3.0 and exponent 1.0 saturates at 3.0.
        assert!((pow_norm(1_000.0, 100.0, 1.0, Some(3.0)) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_size_norm_saturates() {
        assert_eq!(size_norm(500.1), 1.0);
        assert_eq!(size_norm(10_000.0), 1.0);
    }

    #[test]
    fn test_reference_scores_scenario() {
        // 52 x (1200/52 = 23) sums to 1196, shy of the 1200 reference; bump
        // four weeks to 24 so the series is exact and all 52 weeks active.
        let mut inputs = reference_inputs();
        let mut series = vec![23_i64; 52];
        for slot in series.iter_mut().take(4) {
            *slot = 24;
        }
        inputs.participation_all = series;

        assert_eq!(inputs.annual_commits(), 1_200);
        assert_eq!(inputs.active_weeks(), 52);

        let p = popularity(&inputs);
        let a = activity(&inputs);
        let m = maturity(&inputs);
        assert!((p - 1_000.0).abs() < 1e-9, "popularity was {p}");
        assert!((a - 1_000.0).abs() < 1e-9, "activity was {a}");
        assert!((m - 1_000.0).abs() < 1e-9, "maturity was {m}");

        // Hotness: positive, pop_momentum saturated at 1, damped by age.
        let h = hotness(&inputs);
        assert!(h > 0.0);
        let age_penalty = 1.0 / (1.0 + 208.0 / 250.0);
        assert!(h < 1_000.0 * age_penalty);
    }

    #[test]
    fn test_youth_damping_floor() {
        let mut inputs = reference_inputs();
        inputs.age_weeks = 0.5;

        // Reconstruct hotness without damping and compare exactly.
        let recency = 0.5_f64.powf(inputs.weeks_since_push / HOT_HALF_LIFE);
        let pop_momentum = (popularity(&inputs) / HOT_POP_SCALE).min(1.0);
        let ratio = inputs.commit_ratio();
        let momentum = if ratio > 0.0 { (1.0 + ratio).ln() } else { 0.0 };
        let age_penalty = 1.0 / (1.0 + inputs.age_weeks / HOT_DECAY_WEEKS);
        let undamped =
            100.0 * (1.5 * recency + 1.5 * momentum + 7.0 * pop_momentum) * age_penalty;

        assert!((hotness(&inputs) - undamped * 0.35).abs() < 1e-9);
    }

    #[test]
    fn test_zero_stars_does_not_poison_popularity() {
        let inputs = ScoreInputs {
            subscribers: 5_000,
            forks: 10_000,
            ..Default::default()
        };
        let p = popularity(&inputs);
        assert!(p.is_finite());
        assert!((p - 400.0).abs() < 1e-9);
    }

    #[test]
    fn test_scores_average_excludes_hotness() {
        let scores = Scores {
            p: 900,
            h: 12_345,
            a: 600,
            m: 300,
        };
        assert_eq!(scores.average(), 600);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let inputs = reference_inputs();
        assert_eq!(score(&inputs), score(&inputs));
    }

    #[test]
    fn test_derived_series_helpers() {
        let inputs = ScoreInputs {
            participation_all: vec![0, 5, 0, 1, 2, 3, 4],
            ..Default::default()
        };
        assert_eq!(inputs.recent_commits(), 10);
        assert_eq!(inputs.annual_commits(), 15);
        assert_eq!(inputs.active_weeks(), 5);
    }

    #[test]
    fn test_short_participation_series() {
        let inputs = ScoreInputs {
            participation_all: vec![7, 2],
            ..Default::default()
        };
        assert_eq!(inputs.recent_commits(), 9);
        assert_eq!(inputs.annual_commits(), 9);
    }
}
