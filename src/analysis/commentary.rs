//! Scorers over who commented and how much.

use std::collections::HashSet;

use super::text::count_words;
use super::{AnalysisError, ApprovalAnalyzer, Scorer};
use crate::pr::PullRequest;

pub const WORD_COUNT: &str = "WordCount";
pub const APPROVAL_COUNT: &str = "ApprovalCount";
pub const COMMENT_COUNT: &str = "CommentCount";
pub const UNIQUE_COMMENTER_COUNT: &str = "UniqueCommenterCount";

/// Words across the title, the body and every comment.
pub struct WordCountScorer;

impl Scorer for WordCountScorer {
    fn attribute(&self) -> &'static str {
        WORD_COUNT
    }

    fn score_multiplier(&self) -> f64 {
        0.1
    }

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError> {
        let words = count_words(&pr.title)
            + count_words(&pr.body)
            + pr.comments.iter().map(|c| count_words(&c.text)).sum::<usize>();
        Ok(words as i64)
    }
}

/// Comments with any non-whitespace text. The body is not a comment.
pub struct CommentCountScorer;

impl Scorer for CommentCountScorer {
    fn attribute(&self) -> &'static str {
        COMMENT_COUNT
    }

    fn score_multiplier(&self) -> f64 {
        20.0
    }

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError> {
        Ok(pr.comments.iter().filter(|c| !c.text.trim().is_empty()).count() as i64)
    }
}

/// Distinct authors across the body and all comments.
pub struct UniqueCommenterScorer;

impl Scorer for UniqueCommenterScorer {
    fn attribute(&self) -> &'static str {
        UNIQUE_COMMENTER_COUNT
    }

    fn score_multiplier(&self) -> f64 {
        15.0
    }

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError> {
        let commenters: HashSet<String> = pr.full_commentary().into_iter().map(|c| c.user.id).collect();
        Ok(commenters.len() as i64)
    }
}

/// Distinct users with at least one approving comment or review.
pub struct ApprovalScorer {
    analyzer: ApprovalAnalyzer,
}

impl ApprovalScorer {
    pub fn new(analyzer: ApprovalAnalyzer) -> Self {
        Self { analyzer }
    }
}

impl Scorer for ApprovalScorer {
    fn attribute(&self) -> &'static str {
        APPROVAL_COUNT
    }

    fn score_multiplier(&self) -> f64 {
        25.0
    }

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError> {
        let approvers: HashSet<&str> = pr
            .comments
            .iter()
            .filter(|c| self.analyzer.is_approval(c))
            .map(|c| c.user.id.as_str())
            .collect();
        Ok(approvers.len() as i64)
    }
}
