mod analysis;
mod config;
mod pr;
mod report;
mod store;
mod watch;

use chrono::Utc;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::EnvFilter;

use crate::pr::StateFilter;
use crate::store::{AnalysisStore, CacheStore, FileAnalysisStore, FileCacheStore};
use crate::watch::RepositoryWatcher;

/// PR Metrics: watches hosted repositories, caches their pull requests and
/// scores how thoroughly each closed PR was reviewed.
#[derive(Parser, Debug)]
#[command(name = "pr-metrics", version, about)]
struct Cli {
    /// Path to the TOML config file
    #[arg(short, long, default_value = config::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Run a single poll cycle and exit
    #[arg(long)]
    once: bool,

    /// Which PRs to pull from upstream each cycle (only closed ones are scored)
    #[arg(long, value_enum, default_value_t = StateFilter::Closed)]
    state: StateFilter,

    /// Optional output file path for markdown report
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    info!(path = %cli.config.display(), "loading configuration");
    let config = config::Config::load(&cli.config)?;

    let cache_store: Arc<dyn CacheStore> = Arc::new(FileCacheStore::new(&config.settings.cache_dir));
    let analysis_store: Arc<dyn AnalysisStore> = Arc::new(FileAnalysisStore::new(&config.settings.cache_dir));

    let mut watchers = Vec::with_capacity(config.repositories.len());
    for repository in &config.repositories {
        let span = info_span!("connect", repo = %repository.slug());
        let watcher = RepositoryWatcher::connect(
            repository.clone(),
            &config,
            Arc::clone(&cache_store),
            Arc::clone(&analysis_store),
        )
        .instrument(span)
        .await?;
        watchers.push(watcher.with_listing(cli.state));
    }
    info!(repositories = watchers.len(), "watching repositories");

    loop {
        let today = Utc::now().date_naive();
        let mut reports = Vec::with_capacity(watchers.len());
        for watcher in &watchers {
            let cycle = match watcher.run_cycle(today).await {
                Ok(snapshot) => watcher.report(snapshot).await,
                Err(err) => Err(err),
            };
            match cycle {
                Ok(built) => reports.push(built),
                Err(err) => error!(repo = %watcher.repository().slug(), error = %err, "poll cycle failed"),
            }
        }
        report::output(&reports, cli.output.as_deref())?;

        if cli.once {
            break;
        }

        info!(secs = config.settings.poll_interval_secs, "sleeping until next cycle");
        tokio::select! {
            _ = tokio::time::sleep(config.settings.poll_interval()) => {}
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, shutting down");
                break;
            }
        }
    }

    Ok(())
}
