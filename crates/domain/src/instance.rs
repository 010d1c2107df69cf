use chrono::{DateTime, Utc};
use chrono_tz::Tz;

use crate::{
    id::ID,
    time::{MINUTES_PER_DAY, julian_day, minute_of_day},
};

/// One concrete occurrence of an event, identified by `(event, begin, end)`.
///
/// The day/minute fields are derived in the instances timezone so that
/// day-level queries never have to re-do zone math.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instance {
    pub event_id: ID,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub start_day: i64,
    pub end_day: i64,
    pub start_minute: i32,
    pub end_minute: i32,
}

impl Instance {
    /// Compute the derived fields for an occurrence in `instances_tz`.
    ///
    /// An instance that ends exactly at a later local midnight is stored as
    /// ending at minute 1440 of the previous day, so that it does not bleed
    /// into a day it occupies for zero minutes.
    pub fn new(
        event_id: ID,
        begin: DateTime<Utc>,
        end: DateTime<Utc>,
        instances_tz: &Tz,
    ) -> Self {
        let start_day = julian_day(begin, instances_tz);
        let start_minute = minute_of_day(begin, instances_tz);
        let mut end_day = julian_day(end, instances_tz);
        let mut end_minute = minute_of_day(end, instances_tz);

        if end_minute == 0 && end_day > start_day {
            end_minute = MINUTES_PER_DAY;
            end_day -= 1;
        }

        Self {
            event_id,
            begin,
            end,
            start_day,
            end_day,
            start_minute,
            end_minute,
        }
    }
}
