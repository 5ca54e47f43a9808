//! Data models for bucketed analytics

use chrono::{DateTime, Duration, Utc};
use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use super::error::AnalyticsError;
use super::granularity::Granularity;

/// Event level, the closed set of categories counted per bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Debug,
    Info,
    Warn,
    Error,
}

impl Level {
    pub const COUNT: usize = 4;

    /// Every known level, in index order
    pub const ALL: [Level; Level::COUNT] = [Level::Debug, Level::Info, Level::Warn, Level::Error];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Level::Debug => "debug",
            Level::Info => "info",
            Level::Warn => "warn",
            Level::Error => "error",
        }
    }

    /// Parse a comma-separated level list such as `"info,error"`.
    ///
    /// Blank input yields an empty list, which means "all levels".
    pub fn parse_list(raw: &str) -> Result<Vec<Level>, AnalyticsError> {
        let mut levels = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse)
            .collect::<Result<Vec<Level>, _>>()?;
        levels.sort();
        levels.dedup();
        Ok(levels)
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Level {
    type Err = AnalyticsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(Level::Debug),
            "info" => Ok(Level::Info),
            "warn" | "warning" => Ok(Level::Warn),
            "error" => Ok(Level::Error),
            _ => Err(AnalyticsError::InvalidLevel(s.to_string())),
        }
    }
}

/// Per-level counts for one bucket.
///
/// Backed by a fixed array so every level is always present; serializes
/// as an object keyed by level name.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LevelCounts([u64; Level::COUNT]);

impl LevelCounts {
    pub fn get(&self, level: Level) -> u64 {
        self.0[level.index()]
    }

    pub fn add(&mut self, level: Level, count: u64) {
        self.0[level.index()] += count;
    }

    pub fn total(&self) -> u64 {
        self.0.iter().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Level, u64)> + '_ {
        Level::ALL.iter().map(move |&level| (level, self.get(level)))
    }
}

impl Serialize for LevelCounts {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(Level::COUNT))?;
        for (level, count) in self.iter() {
            map.serialize_entry(level.as_str(), &count)?;
        }
        map.end()
    }
}

/// One output time bucket
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bucket {
    pub bucket_start: DateTime<Utc>,
    pub bucket_end: DateTime<Utc>,
    pub count_by_category: LevelCounts,
    pub count_total: u64,
}

impl Bucket {
    pub fn new(bucket_start: DateTime<Utc>, granularity: Granularity, counts: LevelCounts) -> Self {
        Self {
            bucket_start,
            bucket_end: bucket_start + granularity.duration(),
            count_total: counts.total(),
            count_by_category: counts,
        }
    }
}

/// Engine output: the complete bucket sequence for an aligned window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsResponse {
    pub buckets: Vec<Bucket>,
    pub total_count: u64,
    pub bucket_size_minutes: Granularity,
}

impl AnalyticsResponse {
    /// Build a response, deriving `total_count` from the buckets
    pub fn from_buckets(buckets: Vec<Bucket>, granularity: Granularity) -> Self {
        let total_count = buckets.iter().map(|b| b.count_total).sum();
        Self {
            buckets,
            total_count,
            bucket_size_minutes: granularity,
        }
    }
}

/// Half-open query window `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl QueryWindow {
    /// Window as supplied by a caller; requires `start < end`
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AnalyticsError> {
        if end <= start {
            return Err(AnalyticsError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    pub fn span(&self) -> Duration {
        self.end - self.start
    }
}

/// Caller offset from UTC used to place day boundaries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct UtcOffset(i32);

impl UtcOffset {
    pub const UTC: UtcOffset = UtcOffset(0);

    /// Build from a (possibly fractional) number of hours, rounded to the
    /// nearest whole minute
    pub fn from_hours(hours: f64) -> Result<Self, AnalyticsError> {
        if !hours.is_finite() || hours.abs() >= 24.0 {
            return Err(AnalyticsError::InvalidOffset(hours));
        }
        let minutes = (hours * 60.0).round() as i32;
        Ok(Self(minutes * 60))
    }

    pub fn seconds(&self) -> i32 {
        self.0
    }
}

/// Validated inbound request for the engine
#[derive(Debug, Clone, PartialEq)]
pub struct AnalyticsRequest {
    pub window: QueryWindow,
    pub utc_offset: UtcOffset,
    /// Empty means all levels
    pub levels: Vec<Level>,
}

impl AnalyticsRequest {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, AnalyticsError> {
        Ok(Self {
            window: QueryWindow::new(start, end)?,
            utc_offset: UtcOffset::UTC,
            levels: Vec::new(),
        })
    }

    pub fn with_utc_offset_hours(mut self, hours: f64) -> Result<Self, AnalyticsError> {
        self.utc_offset = UtcOffset::from_hours(hours)?;
        Ok(self)
    }

    pub fn with_levels(mut self, mut levels: Vec<Level>) -> Self {
        levels.sort();
        levels.dedup();
        self.levels = levels;
        self
    }
}
