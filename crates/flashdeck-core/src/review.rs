//! Review grading and the SM-2 style schedule update

use chrono::{DateTime, Duration, Utc};
use flashdeck_api::ScheduleState;
use flashdeck_config::SchedulerParams;
use flashdeck_util::FlashdeckError;
use std::fmt;
use std::str::FromStr;

/// Recall grade, ordered worst to best
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Rating {
    Forgot,
    Hard,
    Easy,
}

impl Rating {
    pub const ALL: [Rating; 3] = [Rating::Forgot, Rating::Hard, Rating::Easy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Forgot => "forgot",
            Rating::Hard => "hard",
            Rating::Easy => "easy",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = FlashdeckError;

    /// Accepts `forgot`, `hard`, `easy`, and `remembered` as a synonym of `easy`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "forgot" => Ok(Rating::Forgot),
            "hard" => Ok(Rating::Hard),
            "easy" | "remembered" => Ok(Rating::Easy),
            other => Err(FlashdeckError::validation(format!(
                "unknown rating '{other}' (expected forgot, hard or easy)"
            ))),
        }
    }
}

/// Computes the next schedule from the current one and a rating.
///
/// Pure and deterministic: same inputs give the same output. Applying it twice
/// for one logical review double-counts that review.
#[derive(Debug, Clone)]
pub struct ReviewUpdater {
    params: SchedulerParams,
}

impl ReviewUpdater {
    pub fn new(params: SchedulerParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &SchedulerParams {
        &self.params
    }

    pub fn update(&self, state: &ScheduleState, rating: Rating, now: DateTime<Utc>) -> ScheduleState {
        let p = &self.params;

        let (interval, ease) = match rating {
            Rating::Forgot => (p.relearn_interval_days, state.ease_factor - p.forgot_penalty),
            Rating::Hard => (
                grow(state.interval, p.hard_multiplier),
                state.ease_factor - p.hard_penalty,
            ),
            // Growth uses the ease from before this review
            Rating::Easy => (
                grow(state.interval, state.ease_factor),
                state.ease_factor + p.easy_bonus,
            ),
        };

        let interval = interval.min(p.maximum_interval_days);
        let ease_factor = round_ease(ease).max(p.minimum_ease).min(p.maximum_ease);
        let next_review = now
            .checked_add_signed(Duration::days(i64::from(interval)))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        ScheduleState {
            interval,
            ease_factor,
            next_review,
            created_at: state.created_at,
            updated_at: now,
        }
    }
}

/// `max(1, round(interval * factor))`, saturating
fn grow(interval: u32, factor: f64) -> u32 {
    ((f64::from(interval) * factor).round() as u32).max(1)
}

fn round_ease(ease: f64) -> f64 {
    (ease * 100.0).round() / 100.0
}
