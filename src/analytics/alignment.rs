//! Window alignment onto granularity boundaries.
//!
//! Expands an arbitrary `[start, end)` outward so both edges sit on clean
//! boundaries for the chosen granularity, with sub-minute precision dropped.
//!
//! Two regimes:
//! - sub-hour widths align on the minute of the UTC hour; the caller's offset
//!   is not consulted
//! - hour-or-longer widths align on minutes since local midnight, where
//!   "local" is UTC shifted by the caller's offset. Rounding the end past
//!   the last minute of the day rolls over to 00:00 of the next day.
//!
//! Each edge is computed from the original timestamp, never from a
//! previously aligned one.

use chrono::{DateTime, Duration, NaiveDateTime, Timelike, Utc};

use super::granularity::Granularity;
use super::models::UtcOffset;

/// Aligned `[start, end)` window whose span is a whole number of buckets
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlignedWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub granularity: Granularity,
}

impl AlignedWindow {
    pub fn bucket_count(&self) -> i64 {
        (self.end - self.start).num_minutes() / self.granularity.minutes()
    }

    /// Start of bucket `index`
    pub fn bucket_start(&self, index: i64) -> DateTime<Utc> {
        self.start + Duration::minutes(index * self.granularity.minutes())
    }
}

/// Alignment unit for a granularity: the period whose start anchors bucket
/// boundaries, and the offset applied to reach that period's local clock
struct Frame {
    unit_minutes: i64,
    shift: Duration,
}

impl Frame {
    fn for_granularity(granularity: Granularity, utc_offset: UtcOffset) -> Self {
        if granularity.is_sub_hour() {
            Frame {
                unit_minutes: 60,
                shift: Duration::zero(),
            }
        } else {
            Frame {
                unit_minutes: 1440,
                shift: Duration::seconds(utc_offset.seconds() as i64),
            }
        }
    }

    /// Split an instant into the start of its enclosing unit (local clock)
    /// and the whole minutes elapsed within that unit
    fn split(&self, instant: DateTime<Utc>) -> (NaiveDateTime, i64) {
        let local = instant.naive_utc() + self.shift;
        let minute_of_unit = if self.unit_minutes == 60 {
            local.minute() as i64
        } else {
            local.hour() as i64 * 60 + local.minute() as i64
        };
        let unit_start = local
            .with_second(0)
            .and_then(|t| t.with_nanosecond(0))
            .map(|t| t - Duration::minutes(minute_of_unit))
            .unwrap_or(local);
        (unit_start, minute_of_unit)
    }

    fn to_utc(&self, unit_start: NaiveDateTime, minutes: i64) -> DateTime<Utc> {
        // Minutes may equal the unit length; adding it rolls into the next hour/day
        (unit_start + Duration::minutes(minutes) - self.shift).and_utc()
    }
}

fn is_clean(instant: DateTime<Utc>, shift: Duration) -> bool {
    let local = instant.naive_utc() + shift;
    local.second() == 0 && local.nanosecond() == 0
}

/// Floor `start` to a boundary
pub fn align_start(
    start: DateTime<Utc>,
    granularity: Granularity,
    utc_offset: UtcOffset,
) -> DateTime<Utc> {
    let frame = Frame::for_granularity(granularity, utc_offset);
    let g = granularity.minutes();
    let (unit_start, minute) = frame.split(start);
    frame.to_utc(unit_start, minute - minute % g)
}

/// Ceil `end` to a boundary, leaving it untouched when already on one
pub fn align_end(
    end: DateTime<Utc>,
    granularity: Granularity,
    utc_offset: UtcOffset,
) -> DateTime<Utc> {
    let frame = Frame::for_granularity(granularity, utc_offset);
    let g = granularity.minutes();
    let (unit_start, minute) = frame.split(end);

    if is_clean(end, frame.shift) && minute % g == 0 {
        return frame.to_utc(unit_start, minute);
    }

    let ceiled = minute - minute % g + g;
    debug_assert!(ceiled <= frame.unit_minutes);
    frame.to_utc(unit_start, ceiled)
}

/// Expand `[start, end)` outward to granularity boundaries.
///
/// Guarantees `aligned.start <= start`, `aligned.end >= end` and a span of
/// at least one bucket: a degenerate `start == end` input yields exactly
/// one bucket starting at the floored instant.
pub fn align_window(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    granularity: Granularity,
    utc_offset: UtcOffset,
) -> AlignedWindow {
    let aligned_start = align_start(start, granularity, utc_offset);
    let mut aligned_end = align_end(end, granularity, utc_offset);

    if aligned_end <= aligned_start {
        aligned_end = aligned_start + granularity.duration();
    }

    AlignedWindow {
        start: aligned_start,
        end: aligned_end,
        granularity,
    }
}
