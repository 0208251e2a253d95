use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Default config file looked up in the current directory.
pub const DEFAULT_CONFIG_PATH: &str = ".pr-metrics.toml";

/// Deep fetches slower than this would make a single cycle take hours.
pub const MAX_INTER_REQUEST_DELAY: Duration = Duration::from_secs(60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("No repositories configured")]
    NoRepositories,

    #[error("Invalid base URL for {repository}: {url}")]
    InvalidUrl { repository: String, url: String },

    #[error("Missing credentials for {repository}: {needed}")]
    MissingCredentials { repository: String, needed: &'static str },

    #[error("Hosting kind {0} is not supported")]
    UnsupportedHost(HostingKind),

    #[error("{0} must be greater than zero")]
    NonPositiveDuration(&'static str),

    #[error("inter_request_delay_ms must not exceed {}ms", MAX_INTER_REQUEST_DELAY.as_millis())]
    DelayAboveCeiling,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum HostingKind {
    #[serde(rename = "github")]
    GitHub,
    #[serde(rename = "github-enterprise")]
    GitHubEnterprise,
    BitbucketCloud,
    BitbucketServer,
}

impl std::fmt::Display for HostingKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HostingKind::GitHub => write!(f, "github"),
            HostingKind::GitHubEnterprise => write!(f, "github-enterprise"),
            HostingKind::BitbucketCloud => write!(f, "bitbucket-cloud"),
            HostingKind::BitbucketServer => write!(f, "bitbucket-server"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// API token for GitHub kinds. If None, falls back to GITHUB_TOKEN env var.
    pub token: Option<String>,
    /// BitBucket Cloud username
    pub username: Option<String>,
    /// BitBucket Cloud app password
    pub password: Option<String>,
}

/// A repository being watched. Identity is (kind, url, owner, name).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchedRepository {
    pub kind: HostingKind,
    pub url: String,
    pub owner: String,
    pub name: String,
    #[serde(default)]
    pub credentials: Credentials,
}

impl WatchedRepository {
    pub fn slug(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// Words and phrases that mark a comment as a sign-off.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ApprovalVocabulary {
    #[serde(default)]
    pub explicit_approvals: Vec<String>,
    #[serde(default)]
    pub explicit_non_approvals: Vec<String>,
    #[serde(default)]
    pub implicit_approval_phrases: Vec<String>,
}

impl ApprovalVocabulary {
    /// Built-in vocabulary used when the config file has none for a kind.
    pub fn defaults_for(kind: HostingKind) -> Self {
        let mut explicit_approvals = vec!["lgtm", "approved", "approve", ":+1:", "+1", "👍", "ship it"];
        if matches!(kind, HostingKind::GitHub | HostingKind::GitHubEnterprise) {
            explicit_approvals.push(":shipit:");
        }
        ApprovalVocabulary {
            explicit_approvals: explicit_approvals.into_iter().map(String::from).collect(),
            explicit_non_approvals: [
                "not lgtm",
                "not approved",
                "don't approve",
                "do not approve",
                "do not merge",
                "don't merge",
                "-1",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            implicit_approval_phrases: ["looks good to me", "good to merge", "ready to merge", "good to go"]
                .into_iter()
                .map(String::from)
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// Pause after every comment-graph fill, in milliseconds
    #[serde(default = "default_inter_request_delay_ms")]
    pub inter_request_delay_ms: u64,

    /// Pause between poll cycles, in seconds
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,

    /// Directory holding PR caches and metric snapshots
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,

    /// Refresh closed PRs as soon as a cache is initialized
    #[serde(default = "default_refresh_on_start")]
    pub refresh_on_start: bool,
}

fn default_inter_request_delay_ms() -> u64 {
    1_500
}

fn default_poll_interval_secs() -> u64 {
    3_600
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from(".pr-metrics")
}

fn default_refresh_on_start() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            inter_request_delay_ms: default_inter_request_delay_ms(),
            poll_interval_secs: default_poll_interval_secs(),
            cache_dir: default_cache_dir(),
            refresh_on_start: default_refresh_on_start(),
        }
    }
}

impl Settings {
    pub fn inter_request_delay(&self) -> Duration {
        Duration::from_millis(self.inter_request_delay_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Top-level configuration loaded from .pr-metrics.toml.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,

    #[serde(default)]
    pub repositories: Vec<WatchedRepository>,

    /// Approval vocabulary overrides keyed by hosting kind
    #[serde(default)]
    pub approvals: HashMap<HostingKind, ApprovalVocabulary>,
}

impl Config {
    /// Load and validate configuration from `path`.
    pub fn load(path: &Path) -> Result<Config, ConfigError> {
        let mut config = Self::load_from(path)?;
        config.apply_env_tokens();
        config.validate()?;
        Ok(config)
    }

    /// Parse a config file without validating it (useful for testing).
    pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = toml::from_str(&contents)?;
        Ok(config)
    }

    /// Fill missing GitHub tokens from the GITHUB_TOKEN env var.
    fn apply_env_tokens(&mut self) {
        let Ok(token) = std::env::var("GITHUB_TOKEN") else {
            return;
        };
        for repo in &mut self.repositories {
            if matches!(repo.kind, HostingKind::GitHub | HostingKind::GitHubEnterprise)
                && repo.credentials.token.is_none()
            {
                repo.credentials.token = Some(token.clone());
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.settings.inter_request_delay_ms == 0 {
            return Err(ConfigError::NonPositiveDuration("inter_request_delay_ms"));
        }
        if self.settings.inter_request_delay() > MAX_INTER_REQUEST_DELAY {
            return Err(ConfigError::DelayAboveCeiling);
        }
        if self.settings.poll_interval_secs == 0 {
            return Err(ConfigError::NonPositiveDuration("poll_interval_secs"));
        }
        if self.repositories.is_empty() {
            return Err(ConfigError::NoRepositories);
        }

        for repo in &self.repositories {
            if reqwest::Url::parse(&repo.url).is_err() {
                return Err(ConfigError::InvalidUrl {
                    repository: repo.slug(),
                    url: repo.url.clone(),
                });
            }
            match repo.kind {
                HostingKind::GitHub | HostingKind::GitHubEnterprise => {
                    if repo.credentials.token.is_none() {
                        return Err(ConfigError::MissingCredentials {
                            repository: repo.slug(),
                            needed: "token",
                        });
                    }
                }
                HostingKind::BitbucketCloud => {
                    if repo.credentials.username.is_none() || repo.credentials.password.is_none() {
                        return Err(ConfigError::MissingCredentials {
                            repository: repo.slug(),
                            needed: "username and password",
                        });
                    }
                }
                HostingKind::BitbucketServer => {
                    return Err(ConfigError::UnsupportedHost(repo.kind));
                }
            }
        }
        Ok(())
    }

    /// Approval vocabulary for a hosting kind, configured or built-in.
    pub fn approval_vocabulary(&self, kind: HostingKind) -> ApprovalVocabulary {
        self.approvals
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| ApprovalVocabulary::defaults_for(kind))
    }
}
