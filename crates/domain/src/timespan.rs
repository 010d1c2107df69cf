use chrono::{DateTime, Utc};

/// A half-open UTC interval `[start, end)`: the window the instances cache
/// materializes and the expander clips occurrences against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeSpan {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeSpan {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Build from the epoch-ms bounds the cache metadata stores. Values
    /// outside chrono's range clamp to the representable extremes.
    pub fn from_millis(start_ms: i64, end_ms: i64) -> Self {
        Self {
            start: DateTime::from_timestamp_millis(start_ms)
                .unwrap_or(DateTime::<Utc>::UNIX_EPOCH),
            end: DateTime::from_timestamp_millis(end_ms).unwrap_or(DateTime::<Utc>::MAX_UTC),
        }
    }

    pub fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, t: DateTime<Utc>) -> bool {
        self.start <= t && t < self.end
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn contains_is_half_open() {
        let start = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        let end = Utc.with_ymd_and_hms(2024, 6, 2, 0, 0, 0).unwrap();
        let span = TimeSpan::new(start, end);
        assert!(span.contains(start));
        assert!(span.contains(end - chrono::TimeDelta::milliseconds(1)));
        assert!(!span.contains(end));
    }

    #[test]
    fn millis_bounds_round_trip() {
        let span = TimeSpan::from_millis(1_000, 2_000);
        assert_eq!(span.start().timestamp_millis(), 1_000);
        assert_eq!(span.end().timestamp_millis(), 2_000);
    }
}
