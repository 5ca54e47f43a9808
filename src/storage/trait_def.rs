use crate::analytics::Level;
use anyhow::Result;
use async_trait::async_trait;

/// One grouped aggregation request against the event store.
///
/// Rows with `created_at` in `[start_ms, end_ms)` are assigned to bucket
/// `(created_at - start_ms) / bucket_ms` and counted per level.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BucketQuery {
    pub start_ms: i64,
    pub end_ms: i64,
    pub bucket_ms: i64,
    /// Levels to count; never empty (the engine expands "all levels")
    pub levels: Vec<Level>,
}

impl BucketQuery {
    pub fn bucket_count(&self) -> i64 {
        (self.end_ms - self.start_ms) / self.bucket_ms
    }

    pub fn level_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.levels.iter().map(|l| l.as_str())
    }
}

/// Sparse grouped result row: only non-empty (bucket, level) pairs come back
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct BucketCountRow {
    pub bucket_index: i64,
    pub level: String,
    pub count: i64,
}

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Initialize the storage (create tables and indexes)
    async fn init(&self) -> Result<()>;

    /// Run a single grouped count over the query window.
    ///
    /// Rows are returned ordered by bucket index.
    async fn count_by_bucket(&self, query: &BucketQuery) -> Result<Vec<BucketCountRow>>;
}
