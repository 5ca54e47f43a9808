//! Bucketed aggregation query and the engine facade.
//!
//! One grouped count is issued against the store per request; its sparse
//! rows are merged in lockstep with the implicit bucket index so the
//! response always carries the complete, gap-free bucket sequence.

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, warn};

use crate::storage::{BucketCountRow, BucketQuery, EventStore};

use super::alignment::{align_window, AlignedWindow};
use super::error::AnalyticsError;
use super::granularity::select_granularity;
use super::models::{AnalyticsRequest, AnalyticsResponse, Bucket, Level, LevelCounts};

/// Upper bound on synthetic buckets a single request may materialize
pub const DEFAULT_MAX_BUCKETS: i64 = 10_000;

/// Default time allowed for the store round trip
pub const DEFAULT_QUERY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryLimits {
    pub max_buckets: i64,
    pub timeout: Duration,
}

impl Default for QueryLimits {
    fn default() -> Self {
        Self {
            max_buckets: DEFAULT_MAX_BUCKETS,
            timeout: DEFAULT_QUERY_TIMEOUT,
        }
    }
}

/// Query the store for an aligned window and return the complete bucket series.
///
/// An empty `levels` filter counts every level.
pub async fn run_bucketed_query(
    store: &dyn EventStore,
    window: &AlignedWindow,
    levels: &[Level],
    limits: &QueryLimits,
) -> Result<AnalyticsResponse, AnalyticsError> {
    let bucket_count = window.bucket_count();
    if bucket_count > limits.max_buckets {
        warn!(
            "Rejecting analytics window {} - {}: {} buckets exceeds limit {}",
            window.start, window.end, bucket_count, limits.max_buckets
        );
        return Err(AnalyticsError::WindowTooLarge {
            buckets: bucket_count,
            limit: limits.max_buckets,
        });
    }

    let query = BucketQuery {
        start_ms: window.start.timestamp_millis(),
        end_ms: window.end.timestamp_millis(),
        bucket_ms: window.granularity.minutes() * 60_000,
        levels: if levels.is_empty() {
            Level::ALL.to_vec()
        } else {
            levels.to_vec()
        },
    };

    let rows = match tokio::time::timeout(limits.timeout, store.count_by_bucket(&query)).await {
        Ok(Ok(rows)) => rows,
        Ok(Err(e)) => {
            error!("Event store bucket query failed: {:#}", e);
            return Err(AnalyticsError::Store(e));
        }
        Err(_) => {
            error!("Event store bucket query timed out after {:?}", limits.timeout);
            return Err(AnalyticsError::StoreTimeout(limits.timeout));
        }
    };

    debug!(
        "Bucket query returned {} sparse rows for {} buckets",
        rows.len(),
        bucket_count
    );

    let buckets = merge_buckets(window, rows)?;
    Ok(AnalyticsResponse::from_buckets(buckets, window.granularity))
}

/// Left-join sparse store rows onto the full bucket timeline, zero-filling gaps.
///
/// Rows must be ordered by bucket index; anything left over after the last
/// bucket (out of range or out of order) is treated as a malformed response.
pub fn merge_buckets(
    window: &AlignedWindow,
    rows: Vec<BucketCountRow>,
) -> Result<Vec<Bucket>, AnalyticsError> {
    let bucket_count = window.bucket_count();
    let mut rows = rows.into_iter().peekable();
    let mut buckets = Vec::with_capacity(bucket_count.max(0) as usize);

    for index in 0..bucket_count {
        let mut counts = LevelCounts::default();
        while let Some(row) = rows.next_if(|r| r.bucket_index == index) {
            let level: Level = row.level.parse().map_err(|_| {
                AnalyticsError::MalformedStoreResponse(format!("unknown level '{}'", row.level))
            })?;
            let count = u64::try_from(row.count).map_err(|_| {
                AnalyticsError::MalformedStoreResponse(format!(
                    "negative count {} in bucket {}",
                    row.count, index
                ))
            })?;
            counts.add(level, count);
        }
        buckets.push(Bucket::new(window.bucket_start(index), window.granularity, counts));
    }

    if let Some(row) = rows.next() {
        return Err(AnalyticsError::MalformedStoreResponse(format!(
            "row for bucket {} is out of order or outside 0..{}",
            row.bucket_index, bucket_count
        )));
    }

    Ok(buckets)
}

/// Select, align, then query: the full request path
pub struct AnalyticsEngine {
    store: Arc<dyn EventStore>,
    limits: QueryLimits,
}

impl AnalyticsEngine {
    pub fn new(store: Arc<dyn EventStore>, limits: QueryLimits) -> Self {
        Self { store, limits }
    }

    /// Granularity and aligned window for a request, without touching the store
    pub fn plan(request: &AnalyticsRequest) -> AlignedWindow {
        let window = request.window;
        let granularity = select_granularity(window.start, window.end);
        align_window(window.start, window.end, granularity, request.utc_offset)
    }

    pub async fn query(
        &self,
        request: &AnalyticsRequest,
    ) -> Result<AnalyticsResponse, AnalyticsError> {
        let aligned = Self::plan(request);
        debug!(
            "Analytics window {} - {} aligned to {} - {} at {}",
            request.window.start, request.window.end, aligned.start, aligned.end, aligned.granularity
        );

        run_bucketed_query(self.store.as_ref(), &aligned, &request.levels, &self.limits).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analytics::granularity::Granularity;
    use crate::analytics::models::UtcOffset;
    use anyhow::{anyhow, Result};
    use async_trait::async_trait;
    use chrono::{DateTime, Utc};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn row(bucket_index: i64, level: &str, count: i64) -> BucketCountRow {
        BucketCountRow {
            bucket_index,
            level: level.to_string(),
            count,
        }
    }

    /// Store returning canned rows and remembering what it was asked
    #[derive(Default)]
    struct StaticStore {
        rows: Vec<BucketCountRow>,
        calls: AtomicUsize,
        last_query: Mutex<Option<BucketQuery>>,
    }

    #[async_trait]
    impl EventStore for StaticStore {
        async fn init(&self) -> Result<()> {
            Ok(())
        }

        async fn count_by_bucket(&self, query: &BucketQuery) -> Result<Vec<BucketCountRow>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_query.lock().unwrap() = Some(query.clone());
            Ok(self.rows.clone())
        }
    }

    struct FailingStore;

    #[async_trait]
    impl EventStore for FailingStore {
        async fn init(&self) -> Result<()> {
            Ok(())
        }

        async fn count_by_bucket(&self, _query: &BucketQuery) -> Result<Vec<BucketCountRow>> {
            Err(anyhow!("connection reset"))
        }
    }

    struct SlowStore;

    #[async_trait]
    impl EventStore for SlowStore {
        async fn init(&self) -> Result<()> {
            Ok(())
        }

        async fn count_by_bucket(&self, _query: &BucketQuery) -> Result<Vec<BucketCountRow>> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(vec![])
        }
    }

    fn window(start: &str, end: &str, granularity: Granularity) -> AlignedWindow {
        align_window(at(start), at(end), granularity, UtcOffset::UTC)
    }

    #[tokio::test]
    async fn test_no_events_yields_full_zero_sequence() {
        let store = StaticStore::default();
        let w = window("2024-01-01T10:00:00Z", "2024-01-01T10:30:00Z", Granularity::OneMinute);

        let response = run_bucketed_query(&store, &w, &[], &QueryLimits::default())
            .await
            .unwrap();

        assert_eq!(response.buckets.len(), 30);
        assert_eq!(response.total_count, 0);
        assert_eq!(response.bucket_size_minutes, Granularity::OneMinute);
        assert!(response
            .buckets
            .iter()
            .all(|b| b.count_total == 0 && b.count_by_category == LevelCounts::default()));
        assert_eq!(response.buckets[0].bucket_start, w.start);
        assert_eq!(response.buckets[29].bucket_end, w.end);
        assert_eq!(store.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sparse_rows_are_zero_filled_in_order() {
        let store = StaticStore {
            rows: vec![
                row(0, "info", 3),
                row(0, "error", 1),
                row(2, "warn", 4),
                row(5, "info", 2),
            ],
            ..Default::default()
        };
        let w = window("2024-01-01T17:00:00Z", "2024-01-01T17:30:00Z", Granularity::FiveMinutes);

        let response = run_bucketed_query(&store, &w, &[], &QueryLimits::default())
            .await
            .unwrap();

        let totals: Vec<u64> = response.buckets.iter().map(|b| b.count_total).collect();
        assert_eq!(totals, vec![4, 0, 4, 0, 0, 2]);
        assert_eq!(response.total_count, 10);
        assert_eq!(response.buckets[0].count_by_category.get(Level::Error), 1);
        assert_eq!(response.buckets[2].count_by_category.get(Level::Warn), 4);

        for pair in response.buckets.windows(2) {
            assert_eq!(pair[0].bucket_end, pair[1].bucket_start);
        }
        for bucket in &response.buckets {
            assert_eq!(bucket.bucket_end - bucket.bucket_start, Granularity::FiveMinutes.duration());
            assert_eq!(bucket.count_total, bucket.count_by_category.total());
        }
    }

    #[tokio::test]
    async fn test_query_shape_sent_to_store() {
        let store = StaticStore::default();
        let w = window("2024-01-01T17:02:00Z", "2024-01-01T17:08:00Z", Granularity::FiveMinutes);

        run_bucketed_query(&store, &w, &[Level::Error, Level::Warn], &QueryLimits::default())
            .await
            .unwrap();

        let query = store.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.start_ms, at("2024-01-01T17:00:00Z").timestamp_millis());
        assert_eq!(query.end_ms, at("2024-01-01T17:10:00Z").timestamp_millis());
        assert_eq!(query.bucket_ms, 300_000);
        assert_eq!(query.bucket_count(), 2);
        assert_eq!(query.levels, vec![Level::Error, Level::Warn]);
    }

    #[tokio::test]
    async fn test_empty_filter_expands_to_all_levels() {
        let store = StaticStore::default();
        let w = window("2024-01-01T17:00:00Z", "2024-01-01T17:05:00Z", Granularity::FiveMinutes);

        run_bucketed_query(&store, &w, &[], &QueryLimits::default())
            .await
            .unwrap();

        let query = store.last_query.lock().unwrap().clone().unwrap();
        assert_eq!(query.levels, Level::ALL.to_vec());
    }

    #[tokio::test]
    async fn test_oversized_window_rejected_before_store() {
        let store = StaticStore::default();
        let w = window("2024-01-01T00:00:00Z", "2024-03-01T00:00:00Z", Granularity::OneMinute);
        let limits = QueryLimits {
            max_buckets: 1_000,
            ..Default::default()
        };

        let err = run_bucketed_query(&store, &w, &[], &limits).await.unwrap_err();

        assert!(matches!(err, AnalyticsError::WindowTooLarge { limit: 1_000, .. }));
        assert!(err.is_client_error());
        assert_eq!(store.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_store_failure_propagates() {
        let w = window("2024-01-01T17:00:00Z", "2024-01-01T17:05:00Z", Granularity::FiveMinutes);

        let err = run_bucketed_query(&FailingStore, &w, &[], &QueryLimits::default())
            .await
            .unwrap_err();

        assert!(matches!(err, AnalyticsError::Store(_)));
        assert!(!err.is_client_error());
    }

    #[tokio::test]
    async fn test_store_timeout() {
        let w = window("2024-01-01T17:00:00Z", "2024-01-01T17:05:00Z", Granularity::FiveMinutes);
        let limits = QueryLimits {
            timeout: Duration::from_millis(20),
            ..Default::default()
        };

        let err = run_bucketed_query(&SlowStore, &w, &[], &limits).await.unwrap_err();

        assert!(matches!(err, AnalyticsError::StoreTimeout(_)));
    }

    #[test]
    fn test_malformed_rows_rejected() {
        let w = window("2024-01-01T17:00:00Z", "2024-01-01T17:10:00Z", Granularity::FiveMinutes);

        for rows in [
            vec![row(0, "fatal", 1)],
            vec![row(0, "info", -1)],
            vec![row(2, "info", 1)],
            vec![row(1, "info", 1), row(0, "info", 1)],
        ] {
            assert!(matches!(
                merge_buckets(&w, rows),
                Err(AnalyticsError::MalformedStoreResponse(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_engine_selects_and_aligns() {
        let store = Arc::new(StaticStore {
            rows: vec![row(1, "info", 7)],
            ..Default::default()
        });
        let engine = AnalyticsEngine::new(store.clone(), QueryLimits::default());
        let request = AnalyticsRequest::new(at("2024-01-01T00:07:00Z"), at("2024-01-01T05:03:00Z"))
            .unwrap()
            .with_levels(vec![Level::Info]);

        let response = engine.query(&request).await.unwrap();

        // 296 minutes -> 10-minute buckets over 00:00 - 05:10
        assert_eq!(response.bucket_size_minutes, Granularity::TenMinutes);
        assert_eq!(response.buckets.len(), 31);
        assert_eq!(response.buckets[0].bucket_start, at("2024-01-01T00:00:00Z"));
        assert_eq!(response.buckets[30].bucket_end, at("2024-01-01T05:10:00Z"));
        assert_eq!(response.buckets[1].count_by_category.get(Level::Info), 7);
        assert_eq!(response.total_count, 7);
    }
}
