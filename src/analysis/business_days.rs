use chrono::{DateTime, Datelike, Utc, Weekday};

use super::{AnalysisError, Score, Scorer};
use crate::pr::PullRequest;

pub const BUSINESS_DAYS_OPEN: &str = "BusinessDaysOpen";

/// Points for a PR closed within one business day.
const BASE_POINTS: f64 = 50.0;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

/// Business days between open and close, by closed-form approximation
/// rather than a calendar walk. Spans under a day count as one business day
/// unless they end on a weekend.
pub fn business_days_between(
    number: u64,
    opened_at: DateTime<Utc>,
    closed_at: DateTime<Utc>,
) -> Result<i64, AnalysisError> {
    if closed_at < opened_at {
        return Err(AnalysisError::ClosedBeforeOpened {
            number,
            opened_at,
            closed_at,
        });
    }

    let fractional_days = (closed_at - opened_at).num_milliseconds() as f64 / MILLIS_PER_DAY;
    let days = if fractional_days < 1.0 {
        if is_weekend(closed_at.weekday()) {
            0
        } else {
            1
        }
    } else {
        let opened_wd = opened_at.weekday().num_days_from_sunday() as f64;
        let closed_wd = closed_at.weekday().num_days_from_sunday() as f64;
        let mut days = ((fractional_days * 5.0 - (opened_wd - closed_wd) * 2.0) / 7.0).floor() as i64;
        if opened_at.weekday() == Weekday::Sat {
            days -= 1;
        }
        if closed_at.weekday() == Weekday::Sun {
            days -= 1;
        }
        days
    };

    if days < 0 {
        return Err(AnalysisError::NegativeBusinessDays { number, days });
    }
    Ok(days)
}

/// Flat points for a one-day turnaround, losing ten per extra business day.
pub struct BusinessDaysOpenScorer;

impl Scorer for BusinessDaysOpenScorer {
    fn attribute(&self) -> &'static str {
        BUSINESS_DAYS_OPEN
    }

    fn score_multiplier(&self) -> f64 {
        -10.0
    }

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError> {
        let closed_at = pr.closed_at.ok_or(AnalysisError::NotClosed(pr.number))?;
        business_days_between(pr.number, pr.opened_at, closed_at)
    }

    fn score(&self, pr: &PullRequest) -> Result<Score, AnalysisError> {
        let days = self.count(pr)?;
        let points = if days <= 1 {
            BASE_POINTS
        } else {
            BASE_POINTS + (days - 1) as f64 * self.score_multiplier()
        };
        Ok(Score::new(self.attribute(), days, points))
    }
}
