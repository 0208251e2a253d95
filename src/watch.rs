use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::analysis::{AnalysisError, PullRequestAnalyzer, ScoringContext};
use crate::config::{Config, ConfigError, WatchedRepository};
use crate::pr::{self, PullRequestReader, StateFilter, SyncCache, SyncError};
use crate::report::{self, RepositoryMetrics, RepositoryReport};
use crate::store::{AnalysisStore, CacheStore, MetricSnapshot, StoreError};

#[derive(Debug, Error)]
pub enum WatchError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("Scoring aborted: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Failed to save metric snapshot: {0}")]
    Store(#[from] StoreError),
}

/// Keeps one repository's cache current and turns it into daily metrics.
pub struct RepositoryWatcher {
    repository: WatchedRepository,
    cache: SyncCache,
    analyzer: PullRequestAnalyzer,
    analysis_store: Arc<dyn AnalysisStore>,
    listing: StateFilter,
}

impl RepositoryWatcher {
    /// Build the reader for `repository` from its hosting kind and initialize
    /// its cache.
    pub async fn connect(
        repository: WatchedRepository,
        config: &Config,
        cache_store: Arc<dyn CacheStore>,
        analysis_store: Arc<dyn AnalysisStore>,
    ) -> Result<Self, WatchError> {
        let reader = pr::build_reader(&repository)?;
        Ok(Self::with_reader(repository, config, reader, cache_store, analysis_store).await)
    }

    pub async fn with_reader(
        repository: WatchedRepository,
        config: &Config,
        reader: Arc<dyn PullRequestReader>,
        cache_store: Arc<dyn CacheStore>,
        analysis_store: Arc<dyn AnalysisStore>,
    ) -> Self {
        let cache = SyncCache::initialize(
            &repository.owner,
            &repository.name,
            reader,
            cache_store,
            config.settings.inter_request_delay(),
            config.settings.refresh_on_start,
        )
        .await;
        let context = ScoringContext::new(&config.approval_vocabulary(repository.kind));
        Self {
            repository,
            cache,
            analyzer: PullRequestAnalyzer::new(&context),
            analysis_store,
            listing: StateFilter::Closed,
        }
    }

    /// Which PRs each cycle pulls from upstream. Only closed ones are scored.
    pub fn with_listing(mut self, listing: StateFilter) -> Self {
        self.listing = listing;
        self
    }

    pub fn repository(&self) -> &WatchedRepository {
        &self.repository
    }

    /// Refresh PRs, score every closed PR in the cache, and store the rollup
    /// as `today`'s snapshot.
    ///
    /// A validation error on any PR aborts the cycle before anything is saved.
    #[instrument(skip(self), fields(repo = %self.repository.slug()))]
    pub async fn run_cycle(&self, today: NaiveDate) -> Result<MetricSnapshot, WatchError> {
        let updated = self.cache.refresh_from_upstream(self.listing).await?;

        let closed: Vec<_> = self
            .cache
            .all_pull_requests()
            .await
            .into_iter()
            .filter(|pr| pr.is_closed())
            .collect();
        let metrics = closed
            .iter()
            .map(|pr| self.analyzer.analyze(pr))
            .collect::<Result<Vec<_>, _>>()?;
        let metrics: RepositoryMetrics = report::build(metrics);

        let snapshot = MetricSnapshot {
            owner: self.repository.owner.clone(),
            name: self.repository.name.clone(),
            date: today,
            metrics,
        };
        let (owner, name) = (&self.repository.owner, &self.repository.name);
        if self.analysis_store.load(owner, name, today).await?.is_some() {
            debug!(%today, "replacing today's snapshot");
        }
        self.analysis_store.save(std::slice::from_ref(&snapshot)).await?;
        info!(
            updated = updated.len(),
            cached = self.cache.pull_request_count().await,
            comments = self.cache.all_comments().await.len(),
            analyzed = snapshot.metrics.pull_requests.len(),
            "cycle complete"
        );
        Ok(snapshot)
    }

    /// Pair a snapshot with the latest earlier one and the titles of the PRs
    /// the report lists.
    pub async fn report(&self, snapshot: MetricSnapshot) -> Result<RepositoryReport, WatchError> {
        let history = self
            .analysis_store
            .load_history(&self.repository.owner, &self.repository.name)
            .await?;
        let previous = history.into_iter().rev().find(|s| s.date < snapshot.date);

        let numbers: Vec<u64> = report::lowest_scoring(&snapshot.metrics)
            .iter()
            .map(|m| m.number)
            .collect();
        let titles: BTreeMap<u64, String> = self
            .cache
            .pull_requests_by_number(&numbers)
            .await
            .into_iter()
            .map(|pr| (pr.number, pr.title))
            .collect();

        Ok(RepositoryReport {
            snapshot,
            previous,
            titles,
        })
    }
}
