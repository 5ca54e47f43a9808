//! Bucket granularity selection.
//!
//! Picks the smallest bucket width from a fixed ladder of "nice" sizes such
//! that a window is covered by at most [`MAX_BUCKETS`] buckets. Windows too
//! large for the coarsest size fall back to it, so the ceiling is a soft
//! target rather than a guarantee.

use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, Serializer};
use std::fmt;

/// Bucket-count ceiling the selector aims for
pub const MAX_BUCKETS: i64 = 30;

/// Bucket width, one of a fixed ascending ladder from 1 minute to 24 hours
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Granularity {
    OneMinute,
    FiveMinutes,
    TenMinutes,
    FifteenMinutes,
    TwentyMinutes,
    ThirtyMinutes,
    OneHour,
    TwoHours,
    FourHours,
    EightHours,
    TwelveHours,
    OneDay,
}

impl Granularity {
    /// All granularities in ascending order
    pub const LADDER: [Granularity; 12] = [
        Granularity::OneMinute,
        Granularity::FiveMinutes,
        Granularity::TenMinutes,
        Granularity::FifteenMinutes,
        Granularity::TwentyMinutes,
        Granularity::ThirtyMinutes,
        Granularity::OneHour,
        Granularity::TwoHours,
        Granularity::FourHours,
        Granularity::EightHours,
        Granularity::TwelveHours,
        Granularity::OneDay,
    ];

    pub const MIN: Granularity = Granularity::OneMinute;
    pub const MAX: Granularity = Granularity::OneDay;

    pub const fn minutes(self) -> i64 {
        match self {
            Granularity::OneMinute => 1,
            Granularity::FiveMinutes => 5,
            Granularity::TenMinutes => 10,
            Granularity::FifteenMinutes => 15,
            Granularity::TwentyMinutes => 20,
            Granularity::ThirtyMinutes => 30,
            Granularity::OneHour => 60,
            Granularity::TwoHours => 120,
            Granularity::FourHours => 240,
            Granularity::EightHours => 480,
            Granularity::TwelveHours => 720,
            Granularity::OneDay => 1440,
        }
    }

    pub fn duration(self) -> Duration {
        Duration::minutes(self.minutes())
    }

    /// Look up the ladder entry with exactly this width
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        Self::LADDER.into_iter().find(|g| g.minutes() == minutes)
    }

    /// Next coarser ladder entry, if any
    pub fn next_larger(self) -> Option<Self> {
        Self::LADDER.into_iter().find(|g| *g > self)
    }

    /// Hour-or-longer widths align on the local day rather than the hour
    pub fn is_sub_hour(self) -> bool {
        self.minutes() < 60
    }
}

impl fmt::Display for Granularity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}m", self.minutes())
    }
}

impl Serialize for Granularity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.minutes())
    }
}

/// Whole minutes spanned by `[start, end)`, rounded up, never less than one
fn window_minutes(start: DateTime<Utc>, end: DateTime<Utc>) -> i64 {
    let millis = (end - start).num_milliseconds().max(0);
    div_ceil(millis, 60_000).max(1)
}

fn div_ceil(n: i64, d: i64) -> i64 {
    (n + d - 1) / d
}

/// Pick the smallest granularity keeping the window within [`MAX_BUCKETS`].
///
/// Callers must not pass `end < start`.
pub fn select_granularity(start: DateTime<Utc>, end: DateTime<Utc>) -> Granularity {
    let minimum_bucket_size = div_ceil(window_minutes(start, end), MAX_BUCKETS);

    Granularity::LADDER
        .into_iter()
        .find(|g| g.minutes() >= minimum_bucket_size)
        .unwrap_or(Granularity::MAX)
}

/// Number of `granularity` buckets needed to cover the unaligned window
pub fn expected_bucket_count(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
) -> i64 {
    div_ceil(window_minutes(start, end), granularity.minutes())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    #[test]
    fn test_thirty_minute_window_uses_one_minute() {
        let start = at("2024-01-01T10:00:00Z");
        let end = at("2024-01-01T10:30:00Z");
        let g = select_granularity(start, end);
        assert_eq!(g, Granularity::OneMinute);
        assert_eq!(expected_bucket_count(start, end, g), 30);
    }

    #[test]
    fn test_exact_multiple_is_inclusive() {
        // 300 minutes / 30 buckets = 10 exactly
        let start = at("2024-01-01T00:00:00Z");
        let end = start + Duration::minutes(300);
        let g = select_granularity(start, end);
        assert_eq!(g, Granularity::TenMinutes);
        assert_eq!(expected_bucket_count(start, end, g), 30);
    }

    #[test]
    fn test_one_minute_over_boundary_steps_up() {
        let start = at("2024-01-01T00:00:00Z");
        let end = start + Duration::minutes(301);
        assert_eq!(select_granularity(start, end), Granularity::FifteenMinutes);
    }

    #[test]
    fn test_month_window_falls_back_to_max() {
        let start = at("2024-01-01T00:00:00Z");
        let end = start + Duration::days(31);
        let g = select_granularity(start, end);
        assert_eq!(g, Granularity::OneDay);
        assert_eq!(expected_bucket_count(start, end, g), 31);
    }

    #[test]
    fn test_sub_minute_rounds_up() {
        let start = at("2024-01-01T00:00:00Z");
        assert_eq!(window_minutes(start, start), 1);
        assert_eq!(window_minutes(start, start + Duration::seconds(90)), 2);
        assert_eq!(select_granularity(start, start), Granularity::OneMinute);
        assert_eq!(
            select_granularity(start, start + Duration::milliseconds(1)),
            Granularity::OneMinute
        );
    }

    #[test]
    fn test_bucket_count_ceiling_holds_across_ladder() {
        let start = at("2024-03-10T07:13:42Z");
        let max_reach = MAX_BUCKETS * Granularity::MAX.minutes();
        for minutes in (1..=max_reach).step_by(7) {
            let end = start + Duration::minutes(minutes) + Duration::seconds(17);
            let g = select_granularity(start, end);
            let count = expected_bucket_count(start, end, g);
            if window_minutes(start, end) <= max_reach {
                assert!(count <= MAX_BUCKETS, "{minutes} minutes gave {count} x {g}");
            } else {
                assert_eq!(g, Granularity::MAX);
            }
        }
    }

    #[test]
    fn test_selected_is_smallest_fitting() {
        let start = at("2024-01-01T00:00:00Z");
        for minutes in [7, 59, 61, 149, 151, 599, 601, 3599, 7201, 21601] {
            let end = start + Duration::minutes(minutes);
            let g = select_granularity(start, end);
            if g != Granularity::MIN {
                let smaller = Granularity::LADDER
                    .into_iter()
                    .rev()
                    .find(|s| *s < g)
                    .unwrap();
                assert!(expected_bucket_count(start, end, smaller) > MAX_BUCKETS);
            }
        }
    }

    #[test]
    fn test_ladder_lookup() {
        assert_eq!(Granularity::from_minutes(240), Some(Granularity::FourHours));
        assert_eq!(Granularity::from_minutes(45), None);
        assert_eq!(
            Granularity::ThirtyMinutes.next_larger(),
            Some(Granularity::OneHour)
        );
        assert_eq!(Granularity::MAX.next_larger(), None);
        assert!(Granularity::ThirtyMinutes.is_sub_hour());
        assert!(!Granularity::OneHour.is_sub_hour());
        assert_eq!(serde_json::to_string(&Granularity::TwelveHours).unwrap(), "720");
    }
}
