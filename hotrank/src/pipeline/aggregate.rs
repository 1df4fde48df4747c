use serde_json::Value;
use std::cmp::Reverse;
use std::sync::Arc;
use tokio::task::JoinSet;

use super::enrich::ItemEnricher;
use super::helpers::now_formatted;
use crate::models::{BatchStats, CatalogEntry, EnrichedItem, Snapshot};

const PROGRESS_EVERY: usize = 10;

/// Fans enrichment out over the whole list and ranks what comes back.
pub struct Aggregator {
    enricher: Arc<ItemEnricher>,
}

impl Aggregator {
    pub fn new(enricher: Arc<ItemEnricher>) -> Self {
        Self { enricher }
    }

    pub async fn run(&self, entries: Vec<Value>) -> Snapshot {
        self.run_with_stats(entries).await.0
    }

    /// Enriches every object in `entries` concurrently. Failed items are
    /// logged and left out; they never fail the batch.
    ///
    /// Dropping the returned future aborts all outstanding enrichment tasks.
    pub async fn run_with_stats(&self, entries: Vec<Value>) -> (Snapshot, BatchStats) {
        let mut tasks = JoinSet::new();
        for entry in entries.into_iter().filter_map(CatalogEntry::from_value) {
            let enricher = self.enricher.clone();
            tasks.spawn(async move { enricher.enrich(&entry).await });
        }

        let total = tasks.len();
        let mut stats = BatchStats {
            total,
            ..BatchStats::default()
        };
        let mut items = Vec::with_capacity(total);
        let mut completed = 0;

        while let Some(joined) = tasks.join_next().await {
            completed += 1;
            match joined {
                Ok(Ok(item)) => {
                    tracing::debug!("Enriched {} (online={:?})", item.bvid, item.online_count);
                    stats.succeeded += 1;
                    items.push(item);
                }
                Ok(Err(e)) => {
                    stats.failed += 1;
                    tracing::warn!("Single video failed: {}", e);
                }
                Err(e) => {
                    stats.failed += 1;
                    tracing::warn!("Enrichment task did not complete: {}", e);
                }
            }

            if completed % PROGRESS_EVERY == 0 || completed == total {
                tracing::info!("Progress: {}/{} videos processed", completed, total);
            }
        }

        rank(&mut items);

        let snapshot = Snapshot {
            updated_at: now_formatted(),
            items,
        };
        (snapshot, stats)
    }
}

/// Sorts by live viewer count, highest first. Items without a count, or with
/// a negative one, go last. The sort is stable.
pub fn rank(items: &mut [EnrichedItem]) {
    items.sort_by_key(|item| match item.online_count {
        Some(count) if count >= 0 => (0, Reverse(count)),
        _ => (1, Reverse(0)),
    });
}
