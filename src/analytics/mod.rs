//! Adaptive time-bucket analytics
//!
//! Turns an arbitrary `[start, end)` window into a bounded, calendar-aligned
//! series of buckets with per-level event counts:
//!
//! 1. [`select_granularity`] picks a bucket width from a fixed ladder
//! 2. [`align_window`] expands the window onto clean boundaries for that width
//! 3. [`run_bucketed_query`] issues one grouped count against the store and
//!    zero-fills the buckets it did not return

pub mod alignment;
pub mod error;
pub mod granularity;
pub mod models;
pub mod query;

pub use alignment::{align_window, AlignedWindow};
pub use error::AnalyticsError;
pub use granularity::{expected_bucket_count, select_granularity, Granularity, MAX_BUCKETS};
pub use models::{
    AnalyticsRequest, AnalyticsResponse, Bucket, Level, LevelCounts, QueryWindow, UtcOffset,
};
pub use query::{merge_buckets, run_bucketed_query, AnalyticsEngine, QueryLimits};
