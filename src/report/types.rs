use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::analysis::Score;
use crate::store::MetricSnapshot;

/// Scores and derived counts for one closed PR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequestMetrics {
    pub number: u64,
    pub opened_at: DateTime<Utc>,
    pub closed_at: DateTime<Utc>,
    pub business_days_open: i64,
    /// Sum of every score's points
    pub total_score: f64,
    pub comment_count: i64,
    /// Words across title, body and comments
    pub comment_word_count: i64,
    pub approval_count: i64,
    pub median_words_per_comment: i64,
    /// Keyed by score attribute
    pub scores: BTreeMap<String, Score>,
}

impl PullRequestMetrics {
    pub fn open_for(&self) -> TimeDelta {
        self.closed_at - self.opened_at
    }
}

/// Rollup of every analyzed PR in one repository.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepositoryMetrics {
    pub pull_requests: BTreeMap<u64, PullRequestMetrics>,
    pub median_comment_count: i64,
    pub median_comment_word_count: i64,
    pub median_words_per_comment: i64,
    pub comment_count_variance: f64,
    pub comment_count_std_dev: f64,
    pub comment_word_count_variance: f64,
    pub comment_word_count_std_dev: f64,
    pub median_seconds_to_closure: i64,
    pub median_business_days_to_closure: i64,
}

/// What one repository's section of a report is rendered from.
#[derive(Debug, Clone, PartialEq)]
pub struct RepositoryReport {
    pub snapshot: MetricSnapshot,
    /// Most recent earlier snapshot, for trend deltas
    pub previous: Option<MetricSnapshot>,
    /// Titles of the listed lowest-scoring PRs, by number
    pub titles: BTreeMap<u64, String>,
}
