//! Scorers that count pattern matches in commentary text.

use std::collections::HashSet;

use super::text::{code_fence_pattern, code_fragment_pattern, issue_reference_pattern, outside_code_fences, url_pattern};
use super::{AnalysisError, Extractor, Scorer};
use crate::pr::PullRequest;

pub const CODE_FENCE_COUNT: &str = "CodeFenceCount";
pub const CODE_FRAGMENT_COUNT: &str = "CodeFragmentCount";
pub const URL_COUNT: &str = "UrlCount";
pub const REFERENCED_ISSUE_COUNT: &str = "ReferencedIssueCount";

/// Total matches over the full commentary.
fn total_matches<E: Extractor + ?Sized>(extractor: &E, pr: &PullRequest) -> i64 {
    pr.full_commentary()
        .iter()
        .map(|c| extractor.extract(&c.text).len())
        .sum::<usize>() as i64
}

/// Distinct matched strings over the full commentary.
fn distinct_matches<E: Extractor + ?Sized>(extractor: &E, pr: &PullRequest) -> i64 {
    let commentary = pr.full_commentary();
    let distinct: HashSet<&str> = commentary
        .iter()
        .flat_map(|c| extractor.extract(&c.text))
        .collect();
    distinct.len() as i64
}

/// Closed ``` blocks. An unterminated fence is not counted.
pub struct CodeFenceScorer;

impl Extractor for CodeFenceScorer {
    fn extract<'t>(&self, text: &'t str) -> Vec<&'t str> {
        code_fence_pattern().find_iter(text).map(|m| m.as_str()).collect()
    }
}

impl Scorer for CodeFenceScorer {
    fn attribute(&self) -> &'static str {
        CODE_FENCE_COUNT
    }

    fn score_multiplier(&self) -> f64 {
        10.0
    }

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError> {
        Ok(total_matches(self, pr))
    }
}

/// Inline `code` spans outside of fenced blocks.
pub struct CodeFragmentScorer;

impl Extractor for CodeFragmentScorer {
    fn extract<'t>(&self, text: &'t str) -> Vec<&'t str> {
        outside_code_fences(text)
            .into_iter()
            .flat_map(|segment| code_fragment_pattern().find_iter(segment).map(|m| m.as_str()))
            .collect()
    }
}

impl Scorer for CodeFragmentScorer {
    fn attribute(&self) -> &'static str {
        CODE_FRAGMENT_COUNT
    }

    fn score_multiplier(&self) -> f64 {
        2.0
    }

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError> {
        Ok(total_matches(self, pr))
    }
}

pub struct UrlScorer;

impl Extractor for UrlScorer {
    fn extract<'t>(&self, text: &'t str) -> Vec<&'t str> {
        url_pattern().find_iter(text).map(|m| m.as_str()).collect()
    }
}

impl Scorer for UrlScorer {
    fn attribute(&self) -> &'static str {
        URL_COUNT
    }

    fn score_multiplier(&self) -> f64 {
        5.0
    }

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError> {
        Ok(distinct_matches(self, pr))
    }
}

/// `#123`-style references to other issues or PRs.
pub struct IssueLinkScorer;

impl Extractor for IssueLinkScorer {
    fn extract<'t>(&self, text: &'t str) -> Vec<&'t str> {
        issue_reference_pattern().find_iter(text).map(|m| m.as_str()).collect()
    }
}

impl Scorer for IssueLinkScorer {
    fn attribute(&self) -> &'static str {
        REFERENCED_ISSUE_COUNT
    }

    fn score_multiplier(&self) -> f64 {
        5.0
    }

    fn count(&self, pr: &PullRequest) -> Result<i64, AnalysisError> {
        Ok(distinct_matches(self, pr))
    }
}
