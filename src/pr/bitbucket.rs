use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Url;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::{debug, instrument};

use super::types::{Comment, PullRequest, PullRequestState, ReviewState, StateFilter, User};
use super::{http_client, PullRequestReader, ReaderError};
use crate::config::WatchedRepository;

const API_BASE: &str = "https://api.bitbucket.org/2.0/";
const PAGE_LEN: &str = "50";

/// Reads PRs from the BitBucket Cloud 2.0 API using an app password.
pub struct BitbucketCloudReader {
    client: reqwest::Client,
    api_base: Url,
    workspace: String,
    slug: String,
    username: String,
    password: String,
}

#[derive(Deserialize)]
struct Page<T> {
    values: Vec<T>,
    next: Option<String>,
}

#[derive(Deserialize)]
struct Href {
    href: String,
}

#[derive(Deserialize)]
struct Links {
    html: Option<Href>,
}

#[derive(Deserialize)]
struct WireUser {
    uuid: String,
    display_name: String,
    nickname: Option<String>,
    links: Option<Links>,
}

#[derive(Deserialize)]
struct WirePull {
    id: u64,
    title: String,
    description: Option<String>,
    state: String,
    created_on: DateTime<Utc>,
    updated_on: DateTime<Utc>,
    author: Option<WireUser>,
    links: Links,
}

#[derive(Deserialize)]
struct Content {
    raw: Option<String>,
}

#[derive(Deserialize)]
struct WireComment {
    id: u64,
    user: Option<WireUser>,
    created_on: DateTime<Utc>,
    updated_on: Option<DateTime<Utc>>,
    links: Links,
    content: Content,
    #[serde(default)]
    deleted: bool,
}

#[derive(Deserialize)]
struct WireApproval {
    date: DateTime<Utc>,
    user: Option<WireUser>,
}

#[derive(Deserialize)]
struct WireActivity {
    approval: Option<WireApproval>,
}

fn href(links: Option<Links>) -> String {
    links.and_then(|l| l.html).map(|h| h.href).unwrap_or_default()
}

/// Removed accounts get an id keyed on the item they authored.
fn to_user(user: Option<WireUser>, authored: &str) -> User {
    match user {
        Some(u) => User {
            id: u.uuid,
            login: u.nickname.unwrap_or(u.display_name),
            profile_url: href(u.links),
        },
        None => User {
            id: format!("former:{}", authored),
            login: "former user".to_string(),
            profile_url: String::new(),
        },
    }
}

/// BitBucket has no close timestamp; the last update of a finished PR
/// stands in for it.
fn to_pull_request(wire: WirePull) -> PullRequest {
    let (state, closed_at, merged_at) = match wire.state.as_str() {
        "MERGED" => (PullRequestState::Merged, Some(wire.updated_on), Some(wire.updated_on)),
        "DECLINED" | "SUPERSEDED" => (PullRequestState::Closed, Some(wire.updated_on), None),
        _ => (PullRequestState::Open, None, None),
    };
    PullRequest {
        number: wire.id,
        id: wire.id,
        html_url: href(Some(wire.links)),
        submitter: to_user(wire.author, &format!("pull-{}", wire.id)),
        title: wire.title,
        body: wire.description.unwrap_or_default(),
        state,
        opened_at: wire.created_on,
        updated_at: wire.updated_on,
        closed_at,
        merged_at,
        comments: Vec::new(),
    }
}

fn to_comment(wire: WireComment) -> Option<Comment> {
    if wire.deleted {
        return None;
    }
    Some(Comment {
        id: wire.id,
        user: to_user(wire.user, &format!("comment-{}", wire.id)),
        created_at: wire.created_on,
        updated_at: wire.updated_on.unwrap_or(wire.created_on),
        html_url: href(Some(wire.links)),
        review_state: None,
        text: wire.content.raw.unwrap_or_default(),
    })
}

/// Approvals carry no id of their own, so they share id 0 and are told
/// apart by user and date.
fn approval_to_comment(activity: WireActivity, pr_url: &str) -> Option<Comment> {
    let approval = activity.approval?;
    Some(Comment {
        id: 0,
        user: to_user(approval.user, &format!("approval-{}", approval.date.timestamp_millis())),
        created_at: approval.date,
        updated_at: approval.date,
        html_url: pr_url.to_string(),
        review_state: Some(ReviewState::Approved),
        text: String::new(),
    })
}

fn state_params(state: StateFilter) -> Vec<(&'static str, &'static str)> {
    let states: &[&'static str] = match state {
        StateFilter::Open => &["OPEN"],
        StateFilter::Closed => &["MERGED", "DECLINED", "SUPERSEDED"],
        StateFilter::All => &["OPEN", "MERGED", "DECLINED", "SUPERSEDED"],
    };
    states.iter().map(|s| ("state", *s)).collect()
}

impl BitbucketCloudReader {
    pub fn new(repo: &WatchedRepository, username: String, password: String) -> Result<Self, ReaderError> {
        Ok(Self {
            client: http_client()?,
            api_base: Url::parse(API_BASE).map_err(|e| ReaderError::InvalidUrl(e.to_string()))?,
            workspace: repo.owner.clone(),
            slug: repo.name.clone(),
            username,
            password,
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, ReaderError> {
        self.api_base
            .join(&format!("repositories/{}/{}/{}", self.workspace, self.slug, path))
            .map_err(|e| ReaderError::InvalidUrl(e.to_string()))
    }

    /// Follow `next` links until the listing is exhausted.
    async fn get_all_pages<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<Vec<T>, ReaderError> {
        let mut items = Vec::new();
        let mut request = self
            .client
            .get(self.endpoint(path)?)
            .query(query)
            .query(&[("pagelen", PAGE_LEN)]);
        loop {
            let page: Page<T> = request
                .basic_auth(&self.username, Some(&self.password))
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            debug!(path, items = page.values.len(), "received page");
            items.extend(page.values);
            match page.next {
                Some(next) => {
                    let next = Url::parse(&next).map_err(|_| ReaderError::MalformedResponse(next))?;
                    request = self.client.get(next);
                }
                None => return Ok(items),
            }
        }
    }
}

#[async_trait]
impl PullRequestReader for BitbucketCloudReader {
    #[instrument(skip(self), fields(workspace = %self.workspace, repo = %self.slug))]
    async fn root_pull_requests(&self, state: StateFilter) -> Result<Vec<PullRequest>, ReaderError> {
        let pulls: Vec<WirePull> = self.get_all_pages("pullrequests", &state_params(state)).await?;
        Ok(pulls.into_iter().map(to_pull_request).collect())
    }

    #[instrument(skip(self, pr), fields(workspace = %self.workspace, repo = %self.slug, pr = pr.number))]
    async fn fill_comment_graph(&self, pr: &mut PullRequest) -> Result<(), ReaderError> {
        let comments: Vec<WireComment> = self
            .get_all_pages(&format!("pullrequests/{}/comments", pr.number), &[])
            .await?;
        pr.comments.extend(comments.into_iter().filter_map(to_comment));

        let activity: Vec<WireActivity> = self
            .get_all_pages(&format!("pullrequests/{}/activity", pr.number), &[])
            .await?;
        let pr_url = pr.html_url.clone();
        pr.comments
            .extend(activity.into_iter().filter_map(|a| approval_to_comment(a, &pr_url)));

        pr.comments.sort_by_key(|c| c.created_at);
        debug!(comments = pr.comments.len(), "filled comment graph");
        Ok(())
    }
}
