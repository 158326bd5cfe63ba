//! Turning a distance guess into points and feedback.

use std::fmt;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Most points a single round can award.
pub const MAX_ROUND_POINTS: u32 = 5;

/// Qualitative label for a round's points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackTier {
    /// Five points.
    Excellent,
    /// Three points.
    Average,
    /// One point.
    Poor,
    /// Nothing.
    Pathetic,
}

impl FeedbackTier {
    /// Tier for a points value; anything other than 5, 3 or 1 is pathetic.
    pub fn from_points(points: u32) -> Self {
        match points {
            5 => Self::Excellent,
            3 => Self::Average,
            1 => Self::Poor,
            _ => Self::Pathetic,
        }
    }

    /// Short lowercase label.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::Average => "average",
            Self::Poor => "poor",
            Self::Pathetic => "pathetic",
        }
    }

    /// Sentence shown after a guess.
    pub fn reply(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent guess!",
            Self::Average => "average guess. Meh.",
            Self::Poor => "poor guess. Do better!",
            Self::Pathetic => "pathetic guess.",
        }
    }
}

impl fmt::Display for FeedbackTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Points and tier for one guess.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Score {
    /// Awarded points, 0 to 5.
    pub points: u32,
    /// Label derived from `points`.
    pub tier: FeedbackTier,
}

/// Outcome of a submitted guess.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuessResult {
    /// Player's guess in metres.
    pub guess_meters: u32,
    /// Resolved route length in metres.
    pub true_distance_meters: u32,
    /// `|guess - true|`.
    pub absolute_difference: u32,
    /// Awarded points.
    pub points: u32,
    /// Feedback for `points`.
    pub feedback: FeedbackTier,
}

/// Score a guess against the true distance.
///
/// Each tenth of the true distance is one band: within one band earns 5,
/// two bands 3, three bands 1, anything further 0. A true distance of zero
/// makes every band empty, so only an exact guess scores.
pub fn score(true_distance_meters: u32, guess_meters: u32) -> Score {
    let difference = f64::from(true_distance_meters.abs_diff(guess_meters));
    let rate = f64::from(true_distance_meters) / 10.0;

    let mut points: i64 = 0;
    for band in 1..=4_i64 {
        if difference <= rate * band as f64 {
            points = 7 - band * 2;
            break;
        }
    }
    let points = points.max(0) as u32;

    Score {
        points,
        tier: FeedbackTier::from_points(points),
    }
}

/// Score a guess and keep the inputs alongside the result.
pub fn evaluate(true_distance_meters: u32, guess_meters: u32) -> GuessResult {
    let Score { points, tier } = score(true_distance_meters, guess_meters);
    GuessResult {
        guess_meters,
        true_distance_meters,
        absolute_difference: true_distance_meters.abs_diff(guess_meters),
        points,
        feedback: tier,
    }
}

static GUESS_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(\d+(?:[.,]\d+)?)\s*(m|km)?\s*$").expect("invalid guess regex")
});

/// Parse typed input into metres.
///
/// Accepts `1200`, `1200 m`, `1.2km` or `1,2 km`. Returns `None` for anything
/// that is not a non-negative distance that fits in a `u32`.
pub fn parse_guess(input: &str) -> Option<u32> {
    let lowered = input.to_ascii_lowercase();
    let caps = GUESS_RE.captures(&lowered)?;
    let value: f64 = caps.get(1)?.as_str().replace(',', ".").parse().ok()?;
    let meters = match caps.get(2).map(|unit| unit.as_str()) {
        Some("km") => value * 1000.0,
        _ => value,
    }
    .round();
    if meters.is_finite() && meters <= f64::from(u32::MAX) {
        Some(meters as u32)
    } else {
        None
    }
}
