pub mod aggregate;
pub mod catalog;
pub mod enrich;
pub mod helpers;

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::client::{HttpTransport, JsonTransport, RetryPolicy, RetryingFetcher, build_http_client};
use crate::config::Config;
use crate::models::Snapshot;
use crate::rate_limit::RateLimiter;
use crate::scheduler::Cycle;
use crate::snapshot::SnapshotWriter;
use aggregate::Aggregator;
use catalog::{Endpoints, fetch_catalog};
use enrich::ItemEnricher;

/// One fetch → enrich → publish pass over the popular list.
pub struct RankingCycle {
    fetcher: Arc<RetryingFetcher>,
    endpoints: Endpoints,
    aggregator: Aggregator,
    writer: SnapshotWriter,
    max_items: usize,
}

impl RankingCycle {
    pub fn new(
        transport: Arc<dyn JsonTransport>,
        limiter: Arc<RateLimiter>,
        policy: RetryPolicy,
        config: &Config,
    ) -> Self {
        let fetcher = Arc::new(RetryingFetcher::new(transport, limiter, policy));
        let endpoints = Endpoints::from_base(&config.api_base_url);
        let enricher = ItemEnricher::new(fetcher.clone(), endpoints.clone(), config.max_concurrency);

        Self {
            fetcher,
            endpoints,
            aggregator: Aggregator::new(Arc::new(enricher)),
            writer: SnapshotWriter::new(config.output_path.clone()),
            max_items: config.max_items,
        }
    }

    /// Wires the cycle to the real HTTP client described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = build_http_client(config)?;
        Ok(Self::new(
            Arc::new(HttpTransport::new(client)),
            Arc::new(RateLimiter::new(config.request_interval())),
            RetryPolicy::from_config(config),
            config,
        ))
    }

    pub fn writer(&self) -> &SnapshotWriter {
        &self.writer
    }

    /// Runs one cycle and returns the snapshot it published. On error the
    /// previous snapshot stays in place.
    pub async fn run_once(&self) -> Result<Snapshot> {
        let entries = fetch_catalog(&self.fetcher, &self.endpoints, self.max_items)
            .await
            .context("failed to fetch popular list")?;
        tracing::info!("Fetched {} popular videos", entries.len());

        let (snapshot, stats) = self.aggregator.run_with_stats(entries).await;
        if stats.failed > 0 {
            tracing::warn!(
                "{} of {} videos could not be enriched",
                stats.failed,
                stats.total
            );
        }

        self.writer
            .write(&snapshot)
            .await
            .with_context(|| format!("failed to write {}", self.writer.path().display()))?;

        tracing::info!(
            "Updated {} items={} at={}",
            self.writer.path().display(),
            snapshot.items.len(),
            snapshot.updated_at
        );
        Ok(snapshot)
    }
}

#[async_trait]
impl Cycle for RankingCycle {
    fn name(&self) -> &str {
        "popular-ranking"
    }

    async fn run(&self) -> Result<()> {
        self.run_once().await.map(|_| ())
    }
}
