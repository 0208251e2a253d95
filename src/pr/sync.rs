use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use super::types::{Comment, PullRequest, StateFilter};
use super::{PullRequestReader, ReaderError};
use crate::store::{CacheStore, StoreError};

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Failed to list pull requests upstream: {0}")]
    Listing(#[from] ReaderError),

    #[error("Failed to persist PR cache: {0}")]
    Persist(#[from] StoreError),
}

/// Incrementally synchronized cache of one repository's PRs, keyed by number.
///
/// All access goes through one async mutex. The lock is never held across an
/// upstream call, and every read hands back owned copies.
pub struct SyncCache {
    owner: String,
    name: String,
    reader: Arc<dyn PullRequestReader>,
    store: Arc<dyn CacheStore>,
    dos_buffer: Duration,
    pull_requests: Mutex<BTreeMap<u64, PullRequest>>,
}

impl SyncCache {
    /// Load the persisted snapshot and, if asked, refresh closed PRs once.
    ///
    /// A missing or unreadable snapshot starts an empty cache. A failed
    /// startup refresh is logged and left for the next cycle to retry.
    #[instrument(skip(reader, store, dos_buffer))]
    pub async fn initialize(
        owner: &str,
        name: &str,
        reader: Arc<dyn PullRequestReader>,
        store: Arc<dyn CacheStore>,
        dos_buffer: Duration,
        refresh_on_start: bool,
    ) -> Self {
        let cached = match store.load(owner, name).await {
            Ok(Some(prs)) => prs,
            Ok(None) => {
                info!("no PR cache on disk, starting empty");
                Vec::new()
            }
            Err(err) => {
                warn!(error = %err, "PR cache unreadable, starting empty");
                Vec::new()
            }
        };
        debug!(count = cached.len(), "loaded cached pull requests");

        let cache = Self {
            owner: owner.to_string(),
            name: name.to_string(),
            reader,
            store,
            dos_buffer,
            pull_requests: Mutex::new(cached.into_iter().map(|pr| (pr.number, pr)).collect()),
        };

        if refresh_on_start {
            if let Err(err) = cache.refresh_from_upstream(StateFilter::Closed).await {
                warn!(error = %err, "startup refresh failed, serving cached pull requests");
            }
        }
        cache
    }

    /// Pull new and changed PRs from upstream into the cache.
    ///
    /// Comment graphs are filled one PR at a time with `dos_buffer` between
    /// calls. The first failed fill ends the cycle; PRs filled before it are
    /// still merged. Returns the PRs added or updated.
    #[instrument(skip(self), fields(owner = %self.owner, repo = %self.name))]
    pub async fn refresh_from_upstream(&self, state: StateFilter) -> Result<Vec<PullRequest>, SyncError> {
        let roots = self.reader.root_pull_requests(state).await?;
        let listed = roots.len();

        let work_list: Vec<PullRequest> = {
            let cache = self.pull_requests.lock().await;
            roots
                .into_iter()
                .filter(|pr| match cache.get(&pr.number) {
                    Some(cached) => pr.updated_at > cached.updated_at,
                    None => true,
                })
                .collect()
        };
        info!(listed, stale = work_list.len(), "computed work list");

        let mut filled = Vec::with_capacity(work_list.len());
        for mut pr in work_list {
            let result = self.reader.fill_comment_graph(&mut pr).await;
            tokio::time::sleep(self.dos_buffer).await;
            match result {
                Ok(()) => filled.push(pr),
                Err(err) => {
                    warn!(pr = pr.number, error = %err, "comment graph fill failed, ending cycle early");
                    break;
                }
            }
        }

        if filled.is_empty() {
            return Ok(filled);
        }

        let snapshot: Vec<PullRequest> = {
            let mut cache = self.pull_requests.lock().await;
            for pr in &filled {
                cache.insert(pr.number, pr.clone());
            }
            cache.values().cloned().collect()
        };
        info!(updated = filled.len(), total = snapshot.len(), "merged pull requests");

        self.store.save(&snapshot, &self.owner, &self.name).await?;
        Ok(filled)
    }

    pub async fn pull_request_count(&self) -> usize {
        self.pull_requests.lock().await.len()
    }

    #[allow(dead_code)] // Single lookup for library callers; the poll loop uses the batch form
    pub async fn pull_request_by_number(&self, number: u64) -> Option<PullRequest> {
        self.pull_requests.lock().await.get(&number).cloned()
    }

    /// The PRs among `numbers` that are cached; unknown numbers are skipped.
    pub async fn pull_requests_by_number(&self, numbers: &[u64]) -> Vec<PullRequest> {
        let cache = self.pull_requests.lock().await;
        numbers.iter().filter_map(|n| cache.get(n).cloned()).collect()
    }

    pub async fn all_pull_requests(&self) -> Vec<PullRequest> {
        self.pull_requests.lock().await.values().cloned().collect()
    }

    pub async fn all_comments(&self) -> Vec<Comment> {
        self.pull_requests
            .lock()
            .await
            .values()
            .flat_map(|pr| pr.comments.iter().cloned())
            .collect()
    }
}
