use async_trait::async_trait;
use std::io;
use std::path::PathBuf;
use tracing::{debug, instrument};

use super::{repository_dir, write_atomically, CacheStore, StoreError};
use crate::pr::PullRequest;

const CACHE_FILE: &str = "pull_requests.json";

/// Keeps each repository's PRs as a JSON array under
/// `<root>/<owner>/<name>/pull_requests.json`.
pub struct FileCacheStore {
    root: PathBuf,
}

impl FileCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path(&self, owner: &str, name: &str) -> PathBuf {
        repository_dir(&self.root, owner, name).join(CACHE_FILE)
    }
}

#[async_trait]
impl CacheStore for FileCacheStore {
    #[instrument(skip(self))]
    async fn load(&self, owner: &str, name: &str) -> Result<Option<Vec<PullRequest>>, StoreError> {
        let path = self.path(owner, name);
        let contents = match tokio::fs::read_to_string(&path).await {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let pull_requests: Vec<PullRequest> = serde_json::from_str(&contents)?;
        debug!(path = %path.display(), count = pull_requests.len(), "loaded PR cache");
        Ok(Some(pull_requests))
    }

    #[instrument(skip(self, pull_requests), fields(count = pull_requests.len()))]
    async fn save(&self, pull_requests: &[PullRequest], owner: &str, name: &str) -> Result<(), StoreError> {
        let mut sorted: Vec<&PullRequest> = pull_requests.iter().collect();
        sorted.sort_by_key(|pr| pr.number);
        let data = serde_json::to_vec_pretty(&sorted)?;
        let path = self.path(owner, name);
        write_atomically(&path, &data).await?;
        debug!(path = %path.display(), "saved PR cache");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pr::fixtures::{at, closed_pull_request, comment, pull_request};

    #[tokio::test]
    async fn test_load_missing_cache_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        assert!(store.load("org", "repo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load_preserves_numbers_and_updates() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());

        let mut merged = closed_pull_request(9, at(3, 12));
        merged.comments = vec![comment(1, "bob", "```\nlet x = 1;\n```")];
        let prs = vec![merged, pull_request(2), pull_request(5)];
        store.save(&prs, "org", "repo").await.unwrap();

        let loaded = store.load("org", "repo").await.unwrap().unwrap();
        let mut expected: Vec<_> = prs.iter().map(|pr| (pr.number, pr.updated_at)).collect();
        expected.sort();
        let actual: Vec<_> = loaded.iter().map(|pr| (pr.number, pr.updated_at)).collect();
        assert_eq!(actual, expected);
        assert_eq!(loaded[2], prs[0]);
    }

    #[tokio::test]
    async fn test_corrupt_cache_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileCacheStore::new(dir.path());
        let path = store.path("org", "repo");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            store.load("org", "repo").await,
            Err(StoreError::Serialization(_))
        ));
    }
}
