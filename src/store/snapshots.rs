use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::io;
use std::path::PathBuf;
use tracing::{debug, instrument, warn};

use super::{repository_dir, write_atomically, AnalysisStore, MetricSnapshot, StoreError};

const METRICS_DIR: &str = "metrics";
const DATE_FORMAT: &str = "%Y-%m-%d";

/// One JSON file per day under `<root>/<owner>/<name>/metrics/<date>.json`.
pub struct FileAnalysisStore {
    root: PathBuf,
}

impl FileAnalysisStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn dir(&self, owner: &str, name: &str) -> PathBuf {
        repository_dir(&self.root, owner, name).join(METRICS_DIR)
    }

    fn path(&self, owner: &str, name: &str, date: NaiveDate) -> PathBuf {
        self.dir(owner, name)
            .join(format!("{}.json", date.format(DATE_FORMAT)))
    }
}

#[async_trait]
impl AnalysisStore for FileAnalysisStore {
    #[instrument(skip(self, snapshots), fields(count = snapshots.len()))]
    async fn save(&self, snapshots: &[MetricSnapshot]) -> Result<(), StoreError> {
        let mut seen = HashSet::new();
        for snapshot in snapshots {
            if !seen.insert((&snapshot.owner, &snapshot.name, snapshot.date)) {
                return Err(StoreError::DuplicateSnapshot {
                    repository: format!("{}/{}", snapshot.owner, snapshot.name),
                    date: snapshot.date,
                });
            }
        }

        for snapshot in snapshots {
            let path = self.path(&snapshot.owner, &snapshot.name, snapshot.date);
            let data = serde_json::to_vec_pretty(snapshot)?;
            write_atomically(&path, &data).await?;
            debug!(path = %path.display(), "saved metric snapshot");
        }
        Ok(())
    }

    #[instrument(skip(self))]
    async fn load(&self, owner: &str, name: &str, date: NaiveDate) -> Result<Option<MetricSnapshot>, StoreError> {
        match tokio::fs::read_to_string(self.path(owner, name, date)).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    #[instrument(skip(self))]
    async fn load_history(&self, owner: &str, name: &str) -> Result<Vec<MetricSnapshot>, StoreError> {
        let mut entries = match tokio::fs::read_dir(self.dir(owner, name)).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut dates = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(stem) = file_name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            match NaiveDate::parse_from_str(stem, DATE_FORMAT) {
                Ok(date) => dates.push(date),
                Err(_) => warn!(file = %entry.path().display(), "ignoring unrecognized file in metrics directory"),
            }
        }
        dates.sort();

        let mut history = Vec::with_capacity(dates.len());
        for date in dates {
            if let Some(snapshot) = self.load(owner, name, date).await? {
                history.push(snapshot);
            }
        }
        Ok(history)
    }
}
