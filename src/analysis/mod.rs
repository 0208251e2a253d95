pub mod approval;
pub mod business_days;
pub mod commentary;
pub mod extractors;
pub mod stats;
pub mod text;

pub use approval::ApprovalAnalyzer;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;
use tracing::{debug, instrument};

use crate::config::ApprovalVocabulary;
use crate::pr::PullRequest;
use crate::report::PullRequestMetrics;

#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("PR #{number} closed at {closed_at} before it was opened at {opened_at}")]
    ClosedBeforeOpened {
        number: u64,
        opened_at: chrono::DateTime<chrono::Utc>,
        closed_at: chrono::DateTime<chrono::Utc>,
    },

    #[error("PR #{number} computed {days} business days open")]
    NegativeBusinessDays { number: u64, days: i64 },

    #[error("PR #{0} is not closed yet")]
    NotClosed(u64),

    #[error("Score attribute {0} was produced more than once")]
    DuplicateAttribute(String),

    #[error("Unknown score attribute {0}")]
    UnknownAttribute(String),
}

/// One scorer's verdict on one PR.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawScore")]
pub struct Score {
    pub attribute: String,
    pub count: i64,
    pub points: f64,
}

impl Score {
    /// Points are rounded to two decimals, halves away from zero.
    pub fn new(attribute: &str, count: i64, points: f64) -> Self {
        Score {
            attribute: attribute.to_string(),
            count,
            points: stats::round_to(points, 2),
        }
    }
}

#[derive(Deserialize)]
struct RawScore {
    attribute: String,
    count: i64,
    points: f64,
}

/// Stored scores are only accepted for registered attributes, and come back
/// under the registered spelling.
impl TryFrom<RawScore> for Score {
    type Error = AnalysisError;

    fn try_from(raw: RawScore) -> Result<Self, Self::Error> {
        let registration =
            registration(&raw.attribute).ok_or_else(|| AnalysisError::UnknownAttribute(raw.attribute.clone()))?;
        Ok(Score {
            attribute: registration.attribute.to_string(),
            count: raw.count,
            points: raw.points,
        })
    }
}

/// Maps a PR to a `(attribute, count, points)` triple.
///
/// Most scorers only define `count`; the default `score` multiplies it by
/// `score_multiplier`.
pub trait Scorer: Send + Sync {
    fn attribute(&self) -> &'static str;

    fn score_multiplier(&self) -> f64;

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError>;

    fn score(&self, pr: &PullRequest) -> Result<Score, AnalysisError> {
        let count = self.count(pr)?;
        Ok(Score::new(self.attribute(), count, count as f64 * self.score_multiplier()))
    }
}

/// Scorers whose count comes from pattern matches in comment text.
pub trait Extractor: Scorer {
    fn extract<'t>(&self, text: &'t str) -> Vec<&'t str>;
}

/// Shared inputs scorers may need at construction time.
#[derive(Debug, Clone)]
pub struct ScoringContext {
    pub approvals: ApprovalAnalyzer,
}

impl ScoringContext {
    pub fn new(vocabulary: &ApprovalVocabulary) -> Self {
        Self {
            approvals: ApprovalAnalyzer::new(vocabulary),
        }
    }
}

pub struct Registration {
    pub attribute: &'static str,
    pub build: fn(&ScoringContext) -> Box<dyn Scorer>,
}

/// Every known scorer. The analyzer runs all of them, in this order.
pub static REGISTRY: &[Registration] = &[
    Registration {
        attribute: commentary::WORD_COUNT,
        build: |_| Box::new(commentary::WordCountScorer),
    },
    Registration {
        attribute: extractors::CODE_FENCE_COUNT,
        build: |_| Box::new(extractors::CodeFenceScorer),
    },
    Registration {
        attribute: extractors::CODE_FRAGMENT_COUNT,
        build: |_| Box::new(extractors::CodeFragmentScorer),
    },
    Registration {
        attribute: commentary::APPROVAL_COUNT,
        build: |ctx| Box::new(commentary::ApprovalScorer::new(ctx.approvals.clone())),
    },
    Registration {
        attribute: business_days::BUSINESS_DAYS_OPEN,
        build: |_| Box::new(business_days::BusinessDaysOpenScorer),
    },
    Registration {
        attribute: commentary::COMMENT_COUNT,
        build: |_| Box::new(commentary::CommentCountScorer),
    },
    Registration {
        attribute: commentary::UNIQUE_COMMENTER_COUNT,
        build: |_| Box::new(commentary::UniqueCommenterScorer),
    },
    Registration {
        attribute: extractors::URL_COUNT,
        build: |_| Box::new(extractors::UrlScorer),
    },
    Registration {
        attribute: extractors::REFERENCED_ISSUE_COUNT,
        build: |_| Box::new(extractors::IssueLinkScorer),
    },
];

/// Case-insensitive lookup in the registry.
pub fn registration(attribute: &str) -> Option<&'static Registration> {
    REGISTRY
        .iter()
        .find(|r| r.attribute.eq_ignore_ascii_case(attribute))
}

/// Runs a set of scorers over single PRs.
pub struct PullRequestAnalyzer {
    scorers: Vec<Box<dyn Scorer>>,
}

impl PullRequestAnalyzer {
    /// Analyzer with every registered scorer.
    pub fn new(context: &ScoringContext) -> Self {
        Self::with_scorers(REGISTRY.iter().map(|r| (r.build)(context)).collect())
    }

    pub fn with_scorers(scorers: Vec<Box<dyn Scorer>>) -> Self {
        Self { scorers }
    }

    /// Score a closed PR and fold the scores into its metrics.
    #[instrument(skip(self, pr), fields(pr = pr.number))]
    pub fn analyze(&self, pr: &PullRequest) -> Result<PullRequestMetrics, AnalysisError> {
        let closed_at = pr.closed_at.ok_or(AnalysisError::NotClosed(pr.number))?;

        let mut seen = HashSet::new();
        let mut scores = BTreeMap::new();
        for scorer in &self.scorers {
            let score = scorer.score(pr)?;
            if !seen.insert(score.attribute.to_ascii_lowercase()) {
                return Err(AnalysisError::DuplicateAttribute(score.attribute));
            }
            scores.insert(score.attribute.clone(), score);
        }

        let total_score = stats::round_to(scores.values().map(|s| s.points).sum(), 2);
        let count_of = |attribute: &str| scores.get(attribute).map_or(0, |s| s.count);

        let words_per_comment: Vec<i64> = pr
            .comments
            .iter()
            .map(|c| text::count_words(&c.text) as i64)
            .collect();

        let metrics = PullRequestMetrics {
            number: pr.number,
            opened_at: pr.opened_at,
            closed_at,
            business_days_open: count_of(business_days::BUSINESS_DAYS_OPEN),
            total_score,
            comment_count: count_of(commentary::COMMENT_COUNT),
            comment_word_count: count_of(commentary::WORD_COUNT),
            approval_count: count_of(commentary::APPROVAL_COUNT),
            median_words_per_comment: stats::median(&words_per_comment),
            scores,
        };
        debug!(total_score = metrics.total_score, "scored pull request");
        Ok(metrics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostingKind;
    use crate::pr::fixtures::{at, closed_pull_request, comment, pull_request};
    use crate::pr::ReviewState;

    fn analyzer() -> PullRequestAnalyzer {
        PullRequestAnalyzer::new(&ScoringContext::new(&ApprovalVocabulary::defaults_for(
            HostingKind::GitHub,
        )))
    }

    /// Closed the next morning with two reviewers.
    fn reviewed_pull_request() -> PullRequest {
        let mut pr = closed_pull_request(42, at(2, 9));
        pr.title = "Add retry".to_string();
        pr.body = "Retries failed uploads, see #12".to_string();
        let mut approval = comment(2, "carol", "");
        approval.review_state = Some(ReviewState::Approved);
        pr.comments = vec![
            comment(1, "bob", "Should this use `backoff` here?"),
            approval,
            comment(3, "bob", "lgtm"),
        ];
        pr
    }

    #[test]
    fn test_registry_attributes_are_unique_ignoring_case() {
        let mut seen = HashSet::new();
        for r in REGISTRY {
            assert!(seen.insert(r.attribute.to_ascii_lowercase()), "{}", r.attribute);
        }
        assert_eq!(REGISTRY.len(), 9);
    }

    #[test]
    fn test_registered_scorers_report_their_attribute() {
        let context = ScoringContext::new(&ApprovalVocabulary::default());
        for r in REGISTRY {
            assert_eq!((r.build)(&context).attribute(), r.attribute);
        }
    }

    #[test]
    fn test_registration_lookup_ignores_case() {
        assert_eq!(registration("wordcount").unwrap().attribute, "WordCount");
        assert!(registration("LineCount").is_none());
    }

    #[test]
    fn test_analyze_rolls_up_scores() {
        let metrics = analyzer().analyze(&reviewed_pull_request()).unwrap();

        assert_eq!(metrics.number, 42);
        assert_eq!(metrics.business_days_open, 1);
        assert_eq!(metrics.comment_count, 2);
        assert_eq!(metrics.approval_count, 2);
        // title 2 + body 5 + comments 5, 0 and 1
        assert_eq!(metrics.comment_word_count, 13);
        assert_eq!(metrics.median_words_per_comment, 1);
        assert_eq!(metrics.scores.len(), REGISTRY.len());

        let expected: f64 = metrics.scores.values().map(|s| s.points).sum();
        assert!((metrics.total_score - expected).abs() < 1e-9);
        assert_eq!(metrics.scores["CodeFragmentCount"].count, 1);
        assert_eq!(metrics.scores["ReferencedIssueCount"].count, 1);
        assert_eq!(metrics.scores["UniqueCommenterCount"].count, 3);
    }

    #[test]
    fn test_analyze_rejects_open_pr() {
        assert!(matches!(
            analyzer().analyze(&pull_request(1)),
            Err(AnalysisError::NotClosed(1))
        ));
    }

    #[test]
    fn test_analyze_surfaces_validation_errors() {
        let mut pr = reviewed_pull_request();
        pr.closed_at = Some(at(1, 7));
        assert!(matches!(
            analyzer().analyze(&pr),
            Err(AnalysisError::ClosedBeforeOpened { number: 42, .. })
        ));
    }

    #[test]
    fn test_analyze_rejects_duplicate_attributes() {
        let analyzer = PullRequestAnalyzer::with_scorers(vec![
            Box::new(commentary::WordCountScorer) as Box<dyn Scorer>,
            Box::new(commentary::WordCountScorer),
        ]);
        assert!(matches!(
            analyzer.analyze(&reviewed_pull_request()),
            Err(AnalysisError::DuplicateAttribute(_))
        ));
    }

    #[test]
    fn test_missing_scorers_read_as_zero() {
        let analyzer = PullRequestAnalyzer::with_scorers(vec![Box::new(commentary::CommentCountScorer) as Box<dyn Scorer>]);
        let metrics = analyzer.analyze(&reviewed_pull_request()).unwrap();
        assert_eq!(metrics.comment_count, 2);
        assert_eq!(metrics.approval_count, 0);
        assert_eq!(metrics.total_score, 40.0);
    }

    #[test]
    fn test_score_points_are_rounded() {
        let score = Score::new("WordCount", 7, 7.0 * 0.1);
        assert_eq!(score.points, 0.7);
    }

    #[test]
    fn test_score_decodes_registered_attribute() {
        let score: Score =
            serde_json::from_str(r#"{"attribute": "codefencecount", "count": 2, "points": 20.0}"#).unwrap();
        assert_eq!(score.attribute, "CodeFenceCount");
        assert_eq!(score.count, 2);
    }

    #[test]
    fn test_score_rejects_unknown_attribute() {
        let result: Result<Score, _> =
            serde_json::from_str(r#"{"attribute": "Vibes", "count": 1, "points": 1.0}"#);
        assert!(result.is_err());
    }
}
