pub mod cache;
pub mod snapshots;

pub use cache::FileCacheStore;
pub use snapshots::FileAnalysisStore;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::pr::PullRequest;
use crate::report::RepositoryMetrics;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to (de)serialize stored data: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Batch contains more than one snapshot for {repository} on {date}")]
    DuplicateSnapshot { repository: String, date: NaiveDate },
}

/// Durable home of one repository's PR cache.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// `Ok(None)` when nothing has been saved yet.
    async fn load(&self, owner: &str, name: &str) -> Result<Option<Vec<PullRequest>>, StoreError>;

    async fn save(&self, pull_requests: &[PullRequest], owner: &str, name: &str) -> Result<(), StoreError>;
}

/// One day's rollup for one repository.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSnapshot {
    pub owner: String,
    pub name: String,
    pub date: NaiveDate,
    pub metrics: RepositoryMetrics,
}

/// Date-keyed history of repository metrics.
#[async_trait]
pub trait AnalysisStore: Send + Sync {
    /// Rejects the whole batch if it holds two snapshots for the same
    /// repository and date. A snapshot replaces any stored one for its day.
    async fn save(&self, snapshots: &[MetricSnapshot]) -> Result<(), StoreError>;

    async fn load(&self, owner: &str, name: &str, date: NaiveDate) -> Result<Option<MetricSnapshot>, StoreError>;

    /// Every stored snapshot for the repository, oldest first.
    async fn load_history(&self, owner: &str, name: &str) -> Result<Vec<MetricSnapshot>, StoreError>;
}

fn repository_dir(root: &Path, owner: &str, name: &str) -> PathBuf {
    root.join(owner).join(name)
}

/// Write through a sibling temp file so readers never see a torn file.
async fn write_atomically(path: &Path, contents: &[u8]) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, contents).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}
