use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// An account on the hosting provider.
///
/// GitHub hands out numeric ids and BitBucket hands out UUIDs, so the id is
/// kept as an opaque string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    pub login: String,
    pub profile_url: String,
}

/// Outcome attached to a review-workflow comment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReviewState {
    Approved,
    ChangesRequested,
    Commented,
    Dismissed,
    Pending,
}

/// A single piece of PR commentary: an issue comment, an inline review
/// comment, or a review verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub id: u64,
    pub user: User,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub html_url: String,
    /// Only set for comments that came out of the review workflow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub review_state: Option<ReviewState>,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PullRequestState {
    Open,
    Closed,
    Merged,
}

/// Which PRs a root listing should return.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum StateFilter {
    Open,
    Closed,
    All,
}

impl std::fmt::Display for StateFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StateFilter::Open => write!(f, "open"),
            StateFilter::Closed => write!(f, "closed"),
            StateFilter::All => write!(f, "all"),
        }
    }
}

/// A pull request as cached locally.
///
/// Root listings produce this with an empty `comments` list; the reader's
/// comment-graph fill appends to it afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PullRequest {
    /// Unique within one repository
    pub number: u64,
    pub id: u64,
    pub html_url: String,
    pub submitter: User,
    pub title: String,
    #[serde(default)]
    pub body: String,
    pub state: PullRequestState,
    pub opened_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// `None` until the PR is closed
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    /// `None` unless the PR was merged
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl PullRequest {
    pub fn is_closed(&self) -> bool {
        self.closed_at.is_some()
    }

    /// The PR body as a synthetic comment, followed by every real comment.
    pub fn full_commentary(&self) -> Vec<Comment> {
        let mut commentary = Vec::with_capacity(self.comments.len() + 1);
        commentary.push(Comment {
            id: self.id,
            user: self.submitter.clone(),
            created_at: self.opened_at,
            updated_at: self.opened_at,
            html_url: self.html_url.clone(),
            review_state: None,
            text: self.body.clone(),
        });
        commentary.extend(self.comments.iter().cloned());
        commentary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::fixtures::{comment, pull_request};

    #[test]
    fn test_full_commentary_prepends_body() {
        let mut pr = pull_request(7);
        pr.body = "Adds the thing".to_string();
        pr.comments = vec![comment(1, "bob", "looks fine")];

        let commentary = pr.full_commentary();
        assert_eq!(commentary.len(), 2);
        assert_eq!(commentary[0].text, "Adds the thing");
        assert_eq!(commentary[0].user, pr.submitter);
        assert_eq!(commentary[1].text, "looks fine");
    }

    #[test]
    fn test_open_pr_round_trips_without_close_dates() {
        let pr = pull_request(3);
        let json = serde_json::to_string(&pr).unwrap();
        let back: PullRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, pr);
        assert!(!back.is_closed());
    }

    #[test]
    fn test_review_state_serializes_snake_case() {
        let json = serde_json::to_string(&ReviewState::ChangesRequested).unwrap();
        assert_eq!(json, "\"changes_requested\"");
    }
}
