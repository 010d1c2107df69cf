//! Wall-clock conversions shared by the expander and the instances cache.

use chrono::{
    DateTime,
    Datelike,
    Duration,
    LocalResult,
    NaiveDate,
    NaiveDateTime,
    TimeZone,
    Timelike,
    Utc,
};
use chrono_tz::Tz;

/// Julian day number of the Unix epoch (1970-01-01).
pub const EPOCH_JULIAN_DAY: i64 = 2440588;

/// Days from 0001-01-01 (proleptic Gregorian) to the Unix epoch.
const EPOCH_DAYS_FROM_CE: i64 = 719_163;

pub const MINUTES_PER_DAY: i32 = 24 * 60;
pub const MILLIS_PER_DAY: i64 = 24 * 60 * 60 * 1000;

/// Resolve a wall-clock datetime in `tz` to an instant.
///
/// DST gaps roll forward to the first valid wall clock after the gap; folds
/// resolve to the earlier of the two offsets.
pub fn resolve_local(naive: NaiveDateTime, tz: &Tz) -> DateTime<Tz> {
    match tz.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => {
            // Inside a DST gap; gaps are at most a few hours wide.
            let mut probe = naive;
            for _ in 0..8 {
                probe += Duration::minutes(30);
                match tz.from_local_datetime(&probe) {
                    LocalResult::Single(dt) => return dt,
                    LocalResult::Ambiguous(earliest, _) => return earliest,
                    LocalResult::None => continue,
                }
            }
            tz.from_utc_datetime(&naive)
        }
    }
}

/// The Julian day that the instant falls on, seen from `tz`.
pub fn julian_day(t: DateTime<Utc>, tz: &Tz) -> i64 {
    let local_date = t.with_timezone(tz).date_naive();
    i64::from(local_date.num_days_from_ce()) - EPOCH_DAYS_FROM_CE + EPOCH_JULIAN_DAY
}

/// Minutes past local midnight for the instant, seen from `tz`.
pub fn minute_of_day(t: DateTime<Utc>, tz: &Tz) -> i32 {
    let local = t.with_timezone(tz);
    (local.hour() * 60 + local.minute()) as i32
}

/// The instant at which the given Julian day starts in `tz`.
///
/// Zones whose DST transition removes local midnight resolve to the first
/// valid wall clock of the day.
pub fn julian_day_start(julian_day: i64, tz: &Tz) -> Option<DateTime<Utc>> {
    let days_from_ce = julian_day - EPOCH_JULIAN_DAY + EPOCH_DAYS_FROM_CE;
    let date = NaiveDate::from_num_days_from_ce_opt(i32::try_from(days_from_ce).ok()?)?;
    let midnight = date.and_hms_opt(0, 0, 0)?;
    Some(resolve_local(midnight, tz).with_timezone(&Utc))
}

/// Floor the instant to UTC midnight. All-day events live at UTC midnight.
pub fn utc_midnight_floor(t: DateTime<Utc>) -> DateTime<Utc> {
    let ms = t.timestamp_millis();
    let floored = ms.div_euclid(MILLIS_PER_DAY) * MILLIS_PER_DAY;
    DateTime::from_timestamp_millis(floored).unwrap_or(t)
}

/// Whether the instant sits exactly on UTC midnight.
pub fn is_utc_midnight(t: DateTime<Utc>) -> bool {
    t.timestamp_millis().rem_euclid(MILLIS_PER_DAY) == 0
}
