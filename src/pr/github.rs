use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::types::{Comment, PullRequest, PullRequestState, ReviewState, StateFilter, User};
use super::{http_client, PullRequestReader, ReaderError};
use crate::config::{HostingKind, WatchedRepository};

const PUBLIC_API: &str = "https://api.github.com/";
const PER_PAGE: usize = 100;

/// Reads PRs from the GitHub (or GitHub Enterprise) REST API.
pub struct GitHubReader {
    client: reqwest::Client,
    api_base: Url,
    owner: String,
    name: String,
    token: String,
}

#[derive(Deserialize)]
struct WireUser {
    id: u64,
    login: String,
    html_url: String,
}

#[derive(Deserialize)]
struct WirePull {
    number: u64,
    id: u64,
    html_url: String,
    user: Option<WireUser>,
    title: String,
    body: Option<String>,
    state: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
}

/// Issue comments and inline review comments share this shape.
#[derive(Deserialize)]
struct WireComment {
    id: u64,
    user: Option<WireUser>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    html_url: String,
    body: Option<String>,
}

#[derive(Deserialize)]
struct WireReview {
    id: u64,
    user: Option<WireUser>,
    submitted_at: Option<DateTime<Utc>>,
    html_url: String,
    state: String,
    body: Option<String>,
}

/// Deleted accounts come back as `null`; GitHub shows them as "ghost".
/// Each ghost's id is keyed on the item it authored, so separate deleted
/// accounts are never folded into one commenter.
fn to_user(user: Option<WireUser>, authored: &str) -> User {
    match user {
        Some(u) => User {
            id: u.id.to_string(),
            login: u.login,
            profile_url: u.html_url,
        },
        None => User {
            id: format!("ghost:{}", authored),
            login: "ghost".to_string(),
            profile_url: "https://github.com/ghost".to_string(),
        },
    }
}

fn to_pull_request(wire: WirePull) -> PullRequest {
    let state = if wire.merged_at.is_some() {
        PullRequestState::Merged
    } else if wire.state == "closed" {
        PullRequestState::Closed
    } else {
        PullRequestState::Open
    };
    PullRequest {
        number: wire.number,
        id: wire.id,
        html_url: wire.html_url,
        submitter: to_user(wire.user, &format!("pull-{}", wire.number)),
        title: wire.title,
        body: wire.body.unwrap_or_default(),
        state,
        opened_at: wire.created_at,
        updated_at: wire.updated_at,
        closed_at: wire.closed_at,
        merged_at: wire.merged_at,
        comments: Vec::new(),
    }
}

fn to_comment(wire: WireComment) -> Comment {
    Comment {
        id: wire.id,
        user: to_user(wire.user, &format!("comment-{}", wire.id)),
        created_at: wire.created_at,
        updated_at: wire.updated_at,
        html_url: wire.html_url,
        review_state: None,
        text: wire.body.unwrap_or_default(),
    }
}

fn parse_review_state(state: &str) -> Option<ReviewState> {
    match state {
        "APPROVED" => Some(ReviewState::Approved),
        "CHANGES_REQUESTED" => Some(ReviewState::ChangesRequested),
        "COMMENTED" => Some(ReviewState::Commented),
        "DISMISSED" => Some(ReviewState::Dismissed),
        "PENDING" => Some(ReviewState::Pending),
        _ => None,
    }
}

/// Pending reviews have no submission time yet and are skipped.
fn review_to_comment(wire: WireReview) -> Option<Comment> {
    let submitted_at = wire.submitted_at?;
    Some(Comment {
        id: wire.id,
        user: to_user(wire.user, &format!("review-{}", wire.id)),
        created_at: submitted_at,
        updated_at: submitted_at,
        html_url: wire.html_url,
        review_state: parse_review_state(&wire.state),
        text: wire.body.unwrap_or_default(),
    })
}

fn api_base_for(repo: &WatchedRepository) -> Result<Url, ReaderError> {
    let invalid = |_| ReaderError::InvalidUrl(repo.url.clone());
    match repo.kind {
        HostingKind::GitHubEnterprise => {
            let mut base = Url::parse(&repo.url).map_err(invalid)?;
            if !base.path().ends_with('/') {
                let path = format!("{}/", base.path());
                base.set_path(&path);
            }
            base.join("api/v3/").map_err(invalid)
        }
        _ => Url::parse(PUBLIC_API).map_err(invalid),
    }
}

impl GitHubReader {
    pub fn new(repo: &WatchedRepository, token: String) -> Result<Self, ReaderError> {
        Ok(Self {
            client: http_client()?,
            api_base: api_base_for(repo)?,
            owner: repo.owner.clone(),
            name: repo.name.clone(),
            token,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ReaderError> {
        self.api_base
            .join(&format!("repos/{}/{}/{}", self.owner, self.name, path))
            .map_err(|e| ReaderError::InvalidUrl(e.to_string()))
    }

    /// GET every page of a list endpoint.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ReaderError> {
        let url = self.endpoint(path)?;
        let mut items = Vec::new();
        let mut page = 1usize;
        loop {
            let batch: Vec<T> = self
                .client
                .get(url.clone())
                .bearer_auth(&self.token)
                .header("Accept", "application/vnd.github+json")
                .query(query)
                .query(&[("per_page", PER_PAGE), ("page", page)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            debug!(path, page, items = batch.len(), "received page");
            let last_page = batch.len() < PER_PAGE;
            items.extend(batch);
            if last_page {
                return Ok(items);
            }
            page += 1;
        }
    }
}

#[async_trait]
impl PullRequestReader for GitHubReader {
    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.name))]
    async fn root_pull_requests(&self, state: StateFilter) -> Result<Vec<PullRequest>, ReaderError> {
        let state = state.to_string();
        let pulls: Vec<WirePull> = self
            .get_all_pages(
                "pulls",
                &[("state", state.as_str()), ("sort", "updated"), ("direction", "desc")],
            )
            .await?;
        Ok(pulls.into_iter().map(to_pull_request).collect())
    }

    #[instrument(skip(self, pr), fields(owner = %self.owner, repo = %self.name, pr = pr.number))]
    async fn fill_comment_graph(&self, pr: &mut PullRequest) -> Result<(), ReaderError> {
        let issue_comments: Vec<WireComment> = self
            .get_all_pages(&format!("issues/{}/comments", pr.number), &[])
            .await?;
        pr.comments.extend(issue_comments.into_iter().map(to_comment));

        let review_comments: Vec<WireComment> = self
            .get_all_pages(&format!("pulls/{}/comments", pr.number), &[])
            .await?;
        pr.comments.extend(review_comments.into_iter().map(to_comment));

        let reviews: Vec<WireReview> = self
            .get_all_pages(&format!("pulls/{}/reviews", pr.number), &[])
            .await?;
        pr.comments.extend(reviews.into_iter().filter_map(review_to_comment));

        pr.comments.sort_by_key(|c| c.created_at);
        debug!(comments = pr.comments.len(), "filled comment graph");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Credentials;

    fn repo(kind: HostingKind, url: &str) -> WatchedRepository {
        WatchedRepository {
            kind,
            url: url.to_string(),
            owner: "org".to_string(),
            name: "repo".to_string(),
            credentials: Credentials::default(),
        }
    }

    #[test]
    fn test_public_api_base() {
        let base = api_base_for(&repo(HostingKind::GitHub, "https://github.com")).unwrap();
        assert_eq!(base.as_str(), "https://api.github.com/");
    }

    #[test]
    fn test_enterprise_api_base() {
        let base = api_base_for(&repo(HostingKind::GitHubEnterprise, "https://git.corp.example")).unwrap();
        assert_eq!(base.as_str(), "https://git.corp.example/api/v3/");
    }

    #[test]
    fn test_endpoint_path() {
        let reader =
            GitHubReader::new(&repo(HostingKind::GitHub, "https://github.com"), "t".to_string()).unwrap();
        let url = reader.endpoint("pulls/4/reviews").unwrap();
        assert_eq!(url.as_str(), "https://api.github.com/repos/org/repo/pulls/4/reviews");
    }

    #[test]
    fn test_maps_merged_pull() {
        let json = r#"{
            "number": 12, "id": 99, "html_url": "https://github.com/org/repo/pull/12",
            "user": {"id": 5, "login": "alice", "html_url": "https://github.com/alice"},
            "title": "Fix it", "body": null, "state": "closed",
            "created_at": "2024-01-01T08:00:00Z", "updated_at": "2024-01-02T08:00:00Z",
            "closed_at": "2024-01-02T08:00:00Z", "merged_at": "2024-01-02T08:00:00Z"
        }"#;
        let pr = to_pull_request(serde_json::from_str(json).unwrap());
        assert_eq!(pr.number, 12);
        assert_eq!(pr.state, PullRequestState::Merged);
        assert_eq!(pr.submitter.id, "5");
        assert!(pr.body.is_empty());
        assert!(pr.is_closed());
        assert!(pr.comments.is_empty());
    }

    #[test]
    fn test_maps_review_verdict() {
        let json = r#"{
            "id": 7, "user": null, "submitted_at": "2024-01-02T09:00:00Z",
            "html_url": "https://github.com/org/repo/pull/12#pullrequestreview-7",
            "state": "APPROVED", "body": ""
        }"#;
        let comment = review_to_comment(serde_json::from_str(json).unwrap()).unwrap();
        assert_eq!(comment.review_state, Some(ReviewState::Approved));
        assert_eq!(comment.user.login, "ghost");
    }

    #[test]
    fn test_deleted_accounts_stay_distinct() {
        let ghost_comment = |id: u64| {
            let json = format!(
                r#"{{"id": {}, "user": null, "created_at": "2024-01-02T09:00:00Z",
                    "updated_at": "2024-01-02T09:00:00Z",
                    "html_url": "https://github.com/org/repo/pull/12#issuecomment-{}", "body": "ok"}}"#,
                id, id
            );
            to_comment(serde_json::from_str(&json).unwrap())
        };
        let first = ghost_comment(31);
        let second = ghost_comment(32);
        assert_eq!(first.user.login, "ghost");
        assert_ne!(first.user.id, second.user.id);
        assert_eq!(ghost_comment(31).user, first.user);
    }

    #[test]
    fn test_skips_unsubmitted_review() {
        let json = r#"{
            "id": 8, "user": null, "submitted_at": null,
            "html_url": "https://github.com/org/repo/pull/12", "state": "PENDING", "body": null
        }"#;
        assert!(review_to_comment(serde_json::from_str(json).unwrap()).is_none());
    }
}
