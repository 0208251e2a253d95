pub mod bitbucket;
pub mod github;
pub mod sync;
pub mod types;

pub use sync::{SyncCache, SyncError};
pub use types::{Comment, PullRequest, ReviewState, StateFilter};

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ConfigError, HostingKind, WatchedRepository};

/// Applied to every upstream HTTP request; the core itself enforces none.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
pub const USER_AGENT: &str = concat!("pr-metrics/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Error)]
pub enum ReaderError {
    #[error("Upstream API request failed: {0}")]
    ApiRequest(#[from] reqwest::Error),

    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),

    #[error("Unexpected upstream response: {0}")]
    MalformedResponse(String),
}

/// Source of PR data for one repository.
#[async_trait]
pub trait PullRequestReader: Send + Sync {
    /// Shallow listing: PR metadata only, `comments` left empty.
    async fn root_pull_requests(&self, state: StateFilter) -> Result<Vec<PullRequest>, ReaderError>;

    /// Append the PR's comments, review comments and review verdicts in place.
    /// On error the PR may be left partially filled.
    async fn fill_comment_graph(&self, pr: &mut PullRequest) -> Result<(), ReaderError>;
}

/// Build the reader matching a repository's hosting kind.
pub fn build_reader(repo: &WatchedRepository) -> Result<Arc<dyn PullRequestReader>, ConfigError> {
    let missing = |needed| ConfigError::MissingCredentials {
        repository: repo.slug(),
        needed,
    };
    let invalid_url = || ConfigError::InvalidUrl {
        repository: repo.slug(),
        url: repo.url.clone(),
    };

    match repo.kind {
        HostingKind::GitHub | HostingKind::GitHubEnterprise => {
            let token = repo.credentials.token.clone().ok_or_else(|| missing("token"))?;
            let reader = github::GitHubReader::new(repo, token).map_err(|_| invalid_url())?;
            Ok(Arc::new(reader))
        }
        HostingKind::BitbucketCloud => {
            let username = repo.credentials.username.clone().ok_or_else(|| missing("username"))?;
            let password = repo.credentials.password.clone().ok_or_else(|| missing("password"))?;
            let reader = bitbucket::BitbucketCloudReader::new(repo, username, password)
                .map_err(|_| invalid_url())?;
            Ok(Arc::new(reader))
        }
        HostingKind::BitbucketServer => Err(ConfigError::UnsupportedHost(repo.kind)),
    }
}

fn http_client() -> Result<reqwest::Client, ReaderError> {
    Ok(reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(REQUEST_TIMEOUT)
        .build()?)
}
