use chrono::{DateTime, TimeDelta, Utc};
use error_stack::{Report, ResultExt, bail};

use crate::error::AggregationError;

/// Largest accepted `period`; every window costs one quote request.
pub const MAX_PERIOD: usize = 10_000;

/// Half-open time window `[start, end)`; the last window of a split is closed at `end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, Report<AggregationError>> {
        if start > end {
            bail!(AggregationError::InvalidInput {
                reason: format!("range start {start} is after end {end}"),
            });
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// Split into `period` contiguous windows of equal nominal width.
    ///
    /// Every computed end that reaches `self.end` is clamped to it, and the
    /// last window always ends exactly at `self.end`, so the windows cover the
    /// whole range regardless of rounding in the division.
    pub fn split(&self, period: usize) -> Result<Vec<TimeRange>, Report<AggregationError>> {
        if period == 0 {
            bail!(AggregationError::InvalidInput {
                reason: "period must be > 0".into(),
            });
        }
        if period > MAX_PERIOD {
            bail!(AggregationError::InvalidInput {
                reason: format!("period {period} exceeds {MAX_PERIOD}"),
            });
        }

        let divisor = i32::try_from(period).change_context(AggregationError::InvalidInput {
            reason: format!("period {period} is too large"),
        })?;
        let step = self.duration() / divisor;

        let mut windows = Vec::with_capacity(period);
        let mut start = self.start;
        for index in 0..period {
            let mut end = start + step;
            if end >= self.end || index == period - 1 {
                end = self.end;
            }
            windows.push(TimeRange { start, end });
            start = end;
        }

        Ok(windows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn range(from: i64, to: i64) -> TimeRange {
        TimeRange::new(at(from), at(to)).unwrap()
    }

    #[test]
    fn start_after_end_rejected() {
        let err = TimeRange::new(at(10), at(5)).unwrap_err();
        assert!(matches!(
            err.current_context(),
            AggregationError::InvalidInput { .. }
        ));
    }

    #[test]
    fn zero_period_rejected() {
        let err = range(0, 100).split(0).unwrap_err();
        assert!(matches!(
            err.current_context(),
            AggregationError::InvalidInput { .. }
        ));
    }

    #[test]
    fn oversized_period_rejected_before_allocating() {
        let whole = range(0, 172800);
        for period in [MAX_PERIOD + 1, i32::MAX as usize, usize::MAX] {
            let err = whole.split(period).unwrap_err();
            assert!(matches!(
                err.current_context(),
                AggregationError::InvalidInput { .. }
            ));
        }
        assert_eq!(whole.split(MAX_PERIOD).unwrap().len(), MAX_PERIOD);
    }

    #[test]
    fn single_period_is_whole_range() {
        let whole = range(1701289470, 1701300270);
        assert_eq!(whole.split(1).unwrap(), vec![whole]);
    }

    #[test]
    fn three_hour_window_splits_hourly() {
        let windows = range(1701289470, 1701300270).split(3).unwrap();
        assert_eq!(
            windows,
            vec![
                range(1701289470, 1701293070),
                range(1701293070, 1701296670),
                range(1701296670, 1701300270),
            ]
        );
    }

    #[test]
    fn windows_are_contiguous_and_end_exactly_at_range_end() {
        // odd nanosecond total, so most splits truncate
        let whole = TimeRange::new(at(0), at(1000) + TimeDelta::nanoseconds(1)).unwrap();
        for period in 1..=50 {
            let windows = whole.split(period).unwrap();
            assert_eq!(windows.len(), period);
            assert_eq!(windows[0].start(), whole.start());
            assert_eq!(windows[period - 1].end(), whole.end());
            for pair in windows.windows(2) {
                assert_eq!(pair[0].end(), pair[1].start());
            }
            assert!(windows.iter().all(|w| w.start() <= w.end()));
        }
    }

    #[test]
    fn empty_range_yields_zero_width_windows() {
        let windows = range(500, 500).split(4).unwrap();
        assert_eq!(windows.len(), 4);
        assert!(windows.iter().all(|w| w.duration().is_zero()));
    }

    #[test]
    fn windows_never_pass_range_end() {
        // 2ns split five ways: step rounds to 0, every window still ends inside the range
        let whole = TimeRange::new(at(0), at(0) + TimeDelta::nanoseconds(2)).unwrap();
        let windows = whole.split(5).unwrap();
        assert_eq!(windows.len(), 5);
        assert!(windows.iter().all(|w| w.end() <= whole.end()));
        assert_eq!(windows[4].end(), whole.end());
    }
}
