use crate::storage::{BucketCountRow, BucketQuery, EventStore};
use anyhow::Result;
use async_trait::async_trait;
use moka::future::Cache;
use std::sync::Arc;
use std::time::Duration;

/// Read-through cache in front of an event store.
///
/// Dashboards poll the same window repeatedly; identical grouped queries
/// within the TTL are answered from memory. Failures are never cached.
pub struct CachedEventStore {
    /// Underlying storage implementation
    inner: Arc<dyn EventStore>,
    /// Grouped query results keyed by the full query (Moka cache)
    results: Cache<BucketQuery, Arc<Vec<BucketCountRow>>>,
}

impl CachedEventStore {
    pub fn new(inner: Arc<dyn EventStore>, max_entries: u64, ttl_secs: u64) -> Self {
        let results = Cache::builder()
            .max_capacity(max_entries)
            .time_to_live(Duration::from_secs(ttl_secs))
            .build();

        Self { inner, results }
    }

    /// Drop every cached result
    pub fn invalidate_all(&self) {
        self.results.invalidate_all();
    }
}

#[async_trait]
impl EventStore for CachedEventStore {
    async fn init(&self) -> Result<()> {
        self.inner.init().await
    }

    async fn count_by_bucket(&self, query: &BucketQuery) -> Result<Vec<BucketCountRow>> {
        if let Some(cached) = self.results.get(query).await {
            tracing::debug!("Bucket query served from cache");
            return Ok(cached.as_ref().clone());
        }

        let rows = self.inner.count_by_bucket(query).await?;
        self.results
            .insert(query.clone(), Arc::new(rows.clone()))
            .await;

        Ok(rows)
    }
}
