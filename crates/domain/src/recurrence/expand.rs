//! Recurrence expansion: turns a [`RecurrenceSet`] plus an anchor instant
//! into concrete occurrence starts.
//!
//! Rules iterate period by period at their FREQ cadence. Within a period,
//! BY-lists at a coarser granularity than FREQ expand the candidate set and
//! BY-lists at the same or finer granularity filter it (RFC 5545 Table 1).
//! Day-level generation for month-shaped periods goes through a
//! [`MonthDaySet`] bitset value so the hot path never allocates per
//! candidate.

use std::collections::BTreeSet;

use chrono::{DateTime, Datelike, Duration, NaiveDate, Timelike, Utc, Weekday};
use chrono_tz::Tz;
use tracing::warn;

use super::{Frequency, RecurrenceError, RecurrenceRule, RecurrenceSet, WeekdayNum};
use crate::{TimeSpan, time::resolve_local};

/// Safety valve: one expansion never yields more than this many instances.
const MAX_INSTANCES: usize = 3000;

/// Rules whose BY-lists can never match stop after this many fruitless
/// periods instead of spinning forever.
const MAX_EMPTY_PERIODS: u32 = 1000;

/// Expansion may only touch instants representable in 32-bit seconds.
fn check_anchor(dtstart: DateTime<Utc>) -> Result<(), RecurrenceError> {
    let ms = dtstart.timestamp_millis();
    if ms < 0 || ms / 1000 > i64::from(i32::MAX) {
        return Err(RecurrenceError::OutOfRange(ms));
    }
    Ok(())
}

pub(super) fn expand_set(
    set: &RecurrenceSet,
    dtstart: DateTime<Utc>,
    tz: &Tz,
    window: Option<&TimeSpan>,
) -> Result<Vec<DateTime<Utc>>, RecurrenceError> {
    check_anchor(dtstart)?;
    let range = window.map(|w| (w.start().timestamp_millis(), w.end().timestamp_millis()));

    let mut included = BTreeSet::new();
    for rule in &set.rrules {
        expand_rule(rule, dtstart, tz, range, &mut included)?;
    }
    if set.rrules.is_empty() && !set.rdates.is_empty() {
        // A purely enumerated set still starts at the anchor
        emit(dtstart.timestamp_millis(), range, &mut included);
    }
    for rdate in &set.rdates {
        emit(rdate.timestamp_millis(), range, &mut included);
    }

    let mut excluded = BTreeSet::new();
    for rule in &set.exrules {
        expand_rule(rule, dtstart, tz, range, &mut excluded)?;
    }
    for exdate in &set.exdates {
        excluded.insert(exdate.timestamp_millis());
    }

    Ok(included
        .difference(&excluded)
        .filter_map(|ms| DateTime::from_timestamp_millis(*ms))
        .collect())
}

pub(super) fn last_start(
    set: &RecurrenceSet,
    dtstart: DateTime<Utc>,
    tz: &Tz,
) -> Result<Option<DateTime<Utc>>, RecurrenceError> {
    check_anchor(dtstart)?;
    if !set.is_bounded() {
        return Ok(None);
    }

    let mut last = dtstart.timestamp_millis();
    for rule in &set.rrules {
        if let Some(until) = rule.until {
            // UNTIL bounds the series; no need to enumerate it
            last = last.max(until.timestamp_millis());
        } else {
            let mut out = BTreeSet::new();
            expand_rule(rule, dtstart, tz, None, &mut out)?;
            if let Some(max) = out.iter().next_back() {
                last = last.max(*max);
            }
        }
    }
    for rdate in &set.rdates {
        last = last.max(rdate.timestamp_millis());
    }
    Ok(DateTime::from_timestamp_millis(last))
}

fn emit(ms: i64, range: Option<(i64, i64)>, out: &mut BTreeSet<i64>) {
    match range {
        Some((start, end)) => {
            if ms >= start && ms < end {
                out.insert(ms);
            }
        }
        None => {
            out.insert(ms);
        }
    }
}

fn expand_rule(
    rule: &RecurrenceRule,
    dtstart: DateTime<Utc>,
    tz: &Tz,
    range: Option<(i64, i64)>,
    out: &mut BTreeSet<i64>,
) -> Result<(), RecurrenceError> {
    let dtstart_ms = dtstart.timestamp_millis();
    let until_ms = rule.until.map(|u| u.timestamp_millis());

    if let Some(until) = until_ms {
        if dtstart_ms > until {
            return Ok(());
        }
    }

    // The anchor is always part of the series and counts toward COUNT
    emit(dtstart_ms, range, out);
    let mut emitted: u64 = 1;
    if rule.count == Some(1) {
        return Ok(());
    }

    if rule.freq.is_sub_daily() {
        return expand_sub_daily(rule, dtstart, tz, range, until_ms, emitted, out);
    }

    let local_start = dtstart.with_timezone(tz);
    let start_date = local_start.date_naive();
    let times = TimeOfDaySet::new(rule, local_start.hour(), local_start.minute(), local_start.second());

    let mut cursor = PeriodCursor::new(rule, start_date);
    if rule.count.is_none() {
        if let Some((range_start, _)) = range {
            cursor.fast_forward(range_start, tz);
        }
    }

    let mut days: Vec<NaiveDate> = Vec::new();
    let mut cands: Vec<(NaiveDate, u32, u32, u32)> = Vec::new();
    let mut selected: Vec<usize> = Vec::new();
    let mut empty_periods = 0u32;

    loop {
        // Earliest instant this period can produce, with a one-day margin
        // for zone offsets
        let period_floor = resolve_local(
            cursor.first_day().and_hms_opt(0, 0, 0).unwrap_or_default(),
            tz,
        )
        .with_timezone(&Utc)
        .timestamp_millis()
            - 24 * 3600 * 1000;
        if let Some(until) = until_ms {
            if period_floor > until {
                return Ok(());
            }
        }
        if let Some((_, range_end)) = range {
            if period_floor >= range_end {
                return Ok(());
            }
        }

        days.clear();
        cursor.collect_days(rule, start_date, &mut days);

        cands.clear();
        for day in &days {
            for &h in &times.hours {
                for &m in &times.minutes {
                    for &s in &times.seconds {
                        cands.push((*day, h, m, s));
                    }
                }
            }
        }

        if cands.is_empty() {
            empty_periods += 1;
            if empty_periods > MAX_EMPTY_PERIODS {
                warn!("recurrence rule produced no candidates in {MAX_EMPTY_PERIODS} periods, giving up");
                return Ok(());
            }
            cursor.advance();
            continue;
        }
        empty_periods = 0;

        selected.clear();
        if rule.by_set_pos.is_empty() {
            selected.extend(0..cands.len());
        } else {
            let len = cands.len() as i64;
            for &pos in &rule.by_set_pos {
                let idx = if pos > 0 {
                    i64::from(pos) - 1
                } else {
                    len + i64::from(pos)
                };
                if (0..len).contains(&idx) {
                    selected.push(idx as usize);
                }
            }
            selected.sort_unstable();
            selected.dedup();
        }

        for &idx in &selected {
            let (day, h, m, s) = cands[idx];
            let Some(naive) = day.and_hms_opt(h, m, s) else {
                continue;
            };
            let ms = resolve_local(naive, tz).with_timezone(&Utc).timestamp_millis();
            if ms <= dtstart_ms {
                continue;
            }
            if let Some(until) = until_ms {
                if ms > until {
                    continue;
                }
            }
            emitted += 1;
            emit(ms, range, out);
            if let Some(count) = rule.count {
                if emitted >= u64::from(count) {
                    return Ok(());
                }
            }
            if out.len() >= MAX_INSTANCES {
                warn!("recurrence expansion capped at {MAX_INSTANCES} instances");
                return Ok(());
            }
        }

        cursor.advance();
    }
}

/// Sub-daily cadences step arithmetically from the anchor; coarser BY-lists
/// filter, finer ones expand.
fn expand_sub_daily(
    rule: &RecurrenceRule,
    dtstart: DateTime<Utc>,
    tz: &Tz,
    range: Option<(i64, i64)>,
    until_ms: Option<i64>,
    mut emitted: u64,
    out: &mut BTreeSet<i64>,
) -> Result<(), RecurrenceError> {
    const MAX_TICKS: i64 = 1_000_000;

    let step_ms = i64::from(rule.interval)
        * match rule.freq {
            Frequency::Hourly => 3_600_000,
            Frequency::Minutely => 60_000,
            _ => 1_000,
        };
    let dtstart_ms = dtstart.timestamp_millis();

    let minutes: Vec<u32> = if rule.freq == Frequency::Hourly && !rule.by_minute.is_empty() {
        sorted(&rule.by_minute)
    } else {
        Vec::new()
    };
    let seconds: Vec<u32> = if rule.freq != Frequency::Secondly && !rule.by_second.is_empty() {
        sorted(&rule.by_second)
    } else {
        Vec::new()
    };

    let mut k: i64 = 1;
    if rule.count.is_none() {
        if let Some((range_start, _)) = range {
            // Jump close to the window, keeping the tick phase
            let ahead = (range_start - dtstart_ms) / step_ms - 2;
            if ahead > k {
                k = ahead;
            }
        }
    }

    loop {
        let tick_ms = dtstart_ms + k * step_ms;
        if let Some(until) = until_ms {
            if tick_ms > until {
                return Ok(());
            }
        }
        if let Some((_, range_end)) = range {
            if tick_ms - 2 * 3_600_000 >= range_end {
                return Ok(());
            }
        }
        if k > MAX_TICKS {
            warn!("sub-daily recurrence expansion capped at {MAX_TICKS} ticks");
            return Ok(());
        }

        let Some(tick) = DateTime::from_timestamp_millis(tick_ms) else {
            return Ok(());
        };
        let local = tick.with_timezone(tz);

        if passes_date_filters(rule, local.date_naive())
            && (rule.by_hour.is_empty() || rule.by_hour.contains(&local.hour()))
            && (rule.freq == Frequency::Hourly
                || rule.by_minute.is_empty()
                || rule.by_minute.contains(&local.minute()))
            && (rule.freq != Frequency::Secondly
                || rule.by_second.is_empty()
                || rule.by_second.contains(&local.second()))
        {
            // Expand the finer lists within this tick where applicable
            let minute_choices: &[u32] = if minutes.is_empty() {
                std::slice::from_ref(&LOCAL_MINUTE)
            } else {
                &minutes
            };
            let second_choices: &[u32] = if seconds.is_empty() {
                std::slice::from_ref(&LOCAL_SECOND)
            } else {
                &seconds
            };
            for &m in minute_choices {
                for &s in second_choices {
                    let m = if m == LOCAL_MINUTE { local.minute() } else { m };
                    let s = if s == LOCAL_SECOND { local.second() } else { s };
                    let Some(naive) = local.date_naive().and_hms_opt(local.hour(), m, s) else {
                        continue;
                    };
                    let ms = resolve_local(naive, tz).with_timezone(&Utc).timestamp_millis();
                    if ms <= dtstart_ms {
                        continue;
                    }
                    if let Some(until) = until_ms {
                        if ms > until {
                            continue;
                        }
                    }
                    emitted += 1;
                    emit(ms, range, out);
                    if let Some(count) = rule.count {
                        if emitted >= u64::from(count) {
                            return Ok(());
                        }
                    }
                    if out.len() >= MAX_INSTANCES {
                        warn!("recurrence expansion capped at {MAX_INSTANCES} instances");
                        return Ok(());
                    }
                }
            }
        }

        k += 1;
    }
}

// Sentinels meaning "use the tick's own wall-clock value"
const LOCAL_MINUTE: u32 = u32::MAX;
const LOCAL_SECOND: u32 = u32::MAX;

fn passes_date_filters(rule: &RecurrenceRule, date: NaiveDate) -> bool {
    if !rule.by_month.is_empty() && !rule.by_month.contains(&date.month()) {
        return false;
    }
    if !rule.by_month_day.is_empty() {
        let len = days_in_month(date.year(), date.month());
        let day = date.day() as i32;
        let matches = rule
            .by_month_day
            .iter()
            .any(|&md| md == day || md == day - len as i32 - 1);
        if !matches {
            return false;
        }
    }
    if !rule.by_day.is_empty()
        && !rule.by_day.iter().any(|d| d.weekday == date.weekday())
    {
        return false;
    }
    true
}

fn sorted(values: &[u32]) -> Vec<u32> {
    let mut v = values.to_vec();
    v.sort_unstable();
    v.dedup();
    v
}

/// Time-of-day candidates for day-level frequencies: BYHOUR/BYMINUTE/
/// BYSECOND expand, defaulting to the anchor's wall clock.
struct TimeOfDaySet {
    hours: Vec<u32>,
    minutes: Vec<u32>,
    seconds: Vec<u32>,
}

impl TimeOfDaySet {
    fn new(rule: &RecurrenceRule, hour: u32, minute: u32, second: u32) -> Self {
        Self {
            hours: if rule.by_hour.is_empty() {
                vec![hour]
            } else {
                sorted(&rule.by_hour)
            },
            minutes: if rule.by_minute.is_empty() {
                vec![minute]
            } else {
                sorted(&rule.by_minute)
            },
            seconds: if rule.by_second.is_empty() {
                vec![second]
            } else {
                sorted(&rule.by_second)
            },
        }
    }
}

fn days_in_month(year: i32, month: u32) -> u32 {
    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };
    NaiveDate::from_ymd_opt(next_year, next_month, 1)
        .and_then(|d| d.pred_opt())
        .map(|d| d.day())
        .unwrap_or(30)
}

fn weekday_of(year: i32, month: u32, day: u32) -> Option<Weekday> {
    NaiveDate::from_ymd_opt(year, month, day).map(|d| d.weekday())
}

/// The days of one month selected by a rule, as a bitset value. Bit `d`
/// stands for day-of-month `d` (1-based).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MonthDaySet {
    year: i32,
    month: u32,
    days: u32,
}

impl MonthDaySet {
    /// Build the selected-day set for `(year, month)`.
    ///
    /// `default_all` distinguishes generation (month-shaped periods default
    /// to the anchor's day-of-month; a month too short for it yields no
    /// days) from filtering (day-shaped periods default to every day).
    fn build(
        rule: &RecurrenceRule,
        anchor_day: u32,
        year: i32,
        month: u32,
        default_all: bool,
    ) -> Self {
        let len = days_in_month(year, month);
        let mut bits: u32 = 0;

        if !rule.by_month_day.is_empty() {
            for &md in &rule.by_month_day {
                let day = if md > 0 { md } else { len as i32 + 1 + md };
                if (1..=len as i32).contains(&day) {
                    bits |= 1 << day;
                }
            }
        } else if !rule.by_day.is_empty() || default_all {
            for day in 1..=len {
                bits |= 1 << day;
            }
        } else if anchor_day <= len {
            // A month shorter than the anchor's day is skipped, not clamped
            bits |= 1 << anchor_day;
        }

        if !rule.by_day.is_empty() {
            for day in 1..=len {
                if bits & (1 << day) != 0
                    && !Self::day_matches(&rule.by_day, year, month, day, len)
                {
                    bits &= !(1 << day);
                }
            }
        }

        Self { year, month, days: bits }
    }

    fn day_matches(by_day: &[WeekdayNum], year: i32, month: u32, day: u32, len: u32) -> bool {
        let Some(weekday) = weekday_of(year, month, day) else {
            return false;
        };
        by_day.iter().any(|entry| {
            if entry.weekday != weekday {
                return false;
            }
            match entry.ordinal {
                0 => true,
                n if n > 0 => (day - 1) / 7 + 1 == n as u32,
                n => (len - day) / 7 + 1 == (-n) as u32,
            }
        })
    }

    fn contains(&self, day: u32) -> bool {
        self.days & (1 << day) != 0
    }

    fn push_days(&self, out: &mut Vec<NaiveDate>) {
        for day in 1..=31u32 {
            if self.contains(day) {
                if let Some(date) = NaiveDate::from_ymd_opt(self.year, self.month, day) {
                    out.push(date);
                }
            }
        }
    }
}

/// Period iteration state. Month-shaped cursors cache the most recent
/// [`MonthDaySet`] so day-level filters do not rebuild it per day.
enum PeriodCursor {
    Yearly {
        year: i32,
        interval: i32,
    },
    Monthly {
        /// Months since year 0: `year * 12 + month0`
        months: i64,
        interval: i64,
    },
    Weekly {
        start: NaiveDate,
        step_days: i64,
    },
    Daily {
        date: NaiveDate,
        step_days: i64,
        cached: Option<MonthDaySet>,
    },
}

impl PeriodCursor {
    fn new(rule: &RecurrenceRule, start_date: NaiveDate) -> Self {
        match rule.freq {
            Frequency::Yearly => Self::Yearly {
                year: start_date.year(),
                interval: rule.interval as i32,
            },
            Frequency::Monthly => Self::Monthly {
                months: i64::from(start_date.year()) * 12 + i64::from(start_date.month0()),
                interval: i64::from(rule.interval),
            },
            Frequency::Weekly => {
                let offset = days_since_week_start(start_date.weekday(), rule.week_start);
                Self::Weekly {
                    start: start_date - Duration::days(offset),
                    step_days: i64::from(rule.interval) * 7,
                }
            }
            _ => Self::Daily {
                date: start_date,
                step_days: i64::from(rule.interval),
                cached: None,
            },
        }
    }

    fn first_day(&self) -> NaiveDate {
        match self {
            Self::Yearly { year, .. } => {
                NaiveDate::from_ymd_opt(*year, 1, 1).unwrap_or(NaiveDate::MAX)
            }
            Self::Monthly { months, .. } => {
                let year = months.div_euclid(12) as i32;
                let month = months.rem_euclid(12) as u32 + 1;
                NaiveDate::from_ymd_opt(year, month, 1).unwrap_or(NaiveDate::MAX)
            }
            Self::Weekly { start, .. } => *start,
            Self::Daily { date, .. } => *date,
        }
    }

    fn advance(&mut self) {
        match self {
            Self::Yearly { year, interval } => *year += *interval,
            Self::Monthly { months, interval } => *months += *interval,
            Self::Weekly { start, step_days } => *start += Duration::days(*step_days),
            Self::Daily { date, step_days, .. } => *date += Duration::days(*step_days),
        }
    }

    /// Skip whole periods so the cursor lands shortly before `range_start`.
    /// Only used for rules without COUNT (COUNT must see every period).
    fn fast_forward(&mut self, range_start_ms: i64, tz: &Tz) {
        let Some(target) = DateTime::from_timestamp_millis(range_start_ms) else {
            return;
        };
        let target_date = target.with_timezone(tz).date_naive() - Duration::days(2);
        match self {
            Self::Weekly { start, step_days } => {
                let behind = (target_date - *start).num_days();
                if behind > *step_days {
                    *start += Duration::days(behind / *step_days * *step_days);
                }
            }
            Self::Daily { date, step_days, .. } => {
                let behind = (target_date - *date).num_days();
                if behind > *step_days {
                    *date += Duration::days(behind / *step_days * *step_days);
                }
            }
            // Month and year periods are few enough to iterate
            _ => {}
        }
    }

    /// Collect this period's candidate days in chronological order.
    fn collect_days(
        &mut self,
        rule: &RecurrenceRule,
        start_date: NaiveDate,
        out: &mut Vec<NaiveDate>,
    ) {
        match self {
            Self::Yearly { year, .. } => yearly_days(rule, start_date, *year, out),
            Self::Monthly { months, .. } => {
                let year = months.div_euclid(12) as i32;
                let month = months.rem_euclid(12) as u32 + 1;
                if !rule.by_month.is_empty() && !rule.by_month.contains(&month) {
                    return;
                }
                MonthDaySet::build(rule, start_date.day(), year, month, false).push_days(out);
            }
            Self::Weekly { start, .. } => {
                for i in 0..7 {
                    let date = *start + Duration::days(i);
                    let wanted = if rule.by_day.is_empty() {
                        date.weekday() == start_date.weekday()
                    } else {
                        rule.by_day.iter().any(|d| d.weekday == date.weekday())
                    };
                    if !wanted {
                        continue;
                    }
                    if !rule.by_month.is_empty() && !rule.by_month.contains(&date.month()) {
                        continue;
                    }
                    if !rule.by_month_day.is_empty() && !passes_date_filters(rule, date) {
                        continue;
                    }
                    out.push(date);
                }
            }
            Self::Daily { date, cached, .. } => {
                let date = *date;
                if !rule.by_month.is_empty() && !rule.by_month.contains(&date.month()) {
                    return;
                }
                if !rule.by_month_day.is_empty() || !rule.by_day.is_empty() {
                    let stale = !matches!(
                        cached,
                        Some(c) if c.year == date.year() && c.month == date.month()
                    );
                    if stale {
                        *cached = Some(MonthDaySet::build(
                            rule,
                            start_date.day(),
                            date.year(),
                            date.month(),
                            true,
                        ));
                    }
                    if let Some(set) = cached {
                        if !set.contains(date.day()) {
                            return;
                        }
                    }
                }
                out.push(date);
            }
        }
    }
}

/// Days from the start of the week (anchored at `week_start`) to `weekday`.
fn days_since_week_start(weekday: Weekday, week_start: Weekday) -> i64 {
    i64::from(
        (weekday.num_days_from_monday() + 7 - week_start.num_days_from_monday()) % 7,
    )
}

/// One YEARLY period's candidate days, honoring the RFC 5545 precedence of
/// BYYEARDAY > BYWEEKNO > BYMONTH > BYMONTHDAY > BYDAY.
fn yearly_days(
    rule: &RecurrenceRule,
    start_date: NaiveDate,
    year: i32,
    out: &mut Vec<NaiveDate>,
) {
    let year_len = if NaiveDate::from_ymd_opt(year, 2, 29).is_some() {
        366
    } else {
        365
    };

    if !rule.by_year_day.is_empty() {
        for &yd in &rule.by_year_day {
            let ordinal = if yd > 0 { yd } else { year_len + 1 + yd };
            if !(1..=year_len).contains(&ordinal) {
                continue;
            }
            let Some(date) = NaiveDate::from_yo_opt(year, ordinal as u32) else {
                continue;
            };
            if !rule.by_month.is_empty() && !rule.by_month.contains(&date.month()) {
                continue;
            }
            if !rule.by_day.is_empty()
                && !rule.by_day.iter().any(|d| d.weekday == date.weekday())
            {
                continue;
            }
            out.push(date);
        }
    } else if !rule.by_week_no.is_empty() {
        let Some(jan1) = NaiveDate::from_ymd_opt(year, 1, 1) else {
            return;
        };
        let week1_start = week_one_start(jan1, rule.week_start);
        let Some(next_jan1) = NaiveDate::from_ymd_opt(year + 1, 1, 1) else {
            return;
        };
        let weeks_in_year =
            ((week_one_start(next_jan1, rule.week_start) - week1_start).num_days() / 7) as i32;
        for &wk in &rule.by_week_no {
            let week = if wk > 0 { wk } else { weeks_in_year + 1 + wk };
            if !(1..=weeks_in_year).contains(&week) {
                continue;
            }
            let week_start = week1_start + Duration::days(i64::from(week - 1) * 7);
            for i in 0..7 {
                let date = week_start + Duration::days(i);
                let wanted = if rule.by_day.is_empty() {
                    date.weekday() == start_date.weekday()
                } else {
                    rule.by_day.iter().any(|d| d.weekday == date.weekday())
                };
                if !wanted {
                    continue;
                }
                if !rule.by_month.is_empty() && !rule.by_month.contains(&date.month()) {
                    continue;
                }
                out.push(date);
            }
        }
    } else if !rule.by_month.is_empty() {
        for &month in &rule.by_month {
            MonthDaySet::build(rule, start_date.day(), year, month, false).push_days(out);
        }
    } else if !rule.by_month_day.is_empty() {
        for month in 1..=12 {
            MonthDaySet::build(rule, start_date.day(), year, month, false).push_days(out);
        }
    } else if !rule.by_day.is_empty() {
        if rule.by_day.iter().all(|d| d.ordinal == 0) {
            let Some(jan1) = NaiveDate::from_yo_opt(year, 1) else {
                return;
            };
            for ordinal in 0..year_len {
                let date = jan1 + Duration::days(i64::from(ordinal));
                if rule.by_day.iter().any(|d| d.weekday == date.weekday()) {
                    out.push(date);
                }
            }
        } else {
            // Ordinals count matching weekdays across the whole year
            for entry in &rule.by_day {
                let Some(jan1) = NaiveDate::from_yo_opt(year, 1) else {
                    continue;
                };
                let first_offset =
                    (entry.weekday.num_days_from_monday() + 7 - jan1.weekday().num_days_from_monday()) % 7;
                let occurrences = (year_len - first_offset as i32 + 6) / 7;
                let pick = |n: i32| -> Option<NaiveDate> {
                    if !(1..=occurrences).contains(&n) {
                        return None;
                    }
                    Some(jan1 + Duration::days(i64::from(first_offset) + i64::from(n - 1) * 7))
                };
                match entry.ordinal {
                    0 => {
                        for n in 1..=occurrences {
                            if let Some(d) = pick(n) {
                                out.push(d);
                            }
                        }
                    }
                    n if n > 0 => {
                        if let Some(d) = pick(n) {
                            out.push(d);
                        }
                    }
                    n => {
                        if let Some(d) = pick(occurrences + 1 + n) {
                            out.push(d);
                        }
                    }
                }
            }
        }
    } else if let Some(date) =
        NaiveDate::from_ymd_opt(year, start_date.month(), start_date.day())
    {
        // Feb 29 anchors simply skip non-leap years
        out.push(date);
    }

    out.sort_unstable();
    out.dedup();
}

/// The start of week 1: the week (anchored at `week_start`) containing at
/// least four days of the new year.
fn week_one_start(jan1: NaiveDate, week_start: Weekday) -> NaiveDate {
    let offset = days_since_week_start(jan1.weekday(), week_start);
    if offset <= 3 {
        jan1 - Duration::days(offset)
    } else {
        jan1 + Duration::days(7 - offset)
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;
    use chrono_tz::{America::Los_Angeles, UTC};

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn set_of(rrule: &str) -> RecurrenceSet {
        RecurrenceSet::parse(Some(rrule), None, None, None, &UTC).unwrap()
    }

    fn span(start: DateTime<Utc>, end: DateTime<Utc>) -> TimeSpan {
        TimeSpan::new(start, end)
    }

    fn expand_all(set: &RecurrenceSet, dtstart: DateTime<Utc>) -> Vec<DateTime<Utc>> {
        let window = span(utc(1970, 1, 1, 0, 0), utc(2100, 1, 1, 0, 0));
        set.occurrences_between(dtstart, &UTC, &window).unwrap()
    }

    #[test]
    fn weekly_by_day_with_count() {
        let set = set_of("FREQ=WEEKLY;BYDAY=TU,TH;COUNT=6");
        let starts = expand_all(&set, utc(2024, 1, 2, 9, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 2, 9, 0),
                utc(2024, 1, 4, 9, 0),
                utc(2024, 1, 9, 9, 0),
                utc(2024, 1, 11, 9, 0),
                utc(2024, 1, 16, 9, 0),
                utc(2024, 1, 18, 9, 0),
            ]
        );
    }

    #[test]
    fn monthly_day_31_skips_short_months() {
        let set = set_of("FREQ=MONTHLY;BYMONTHDAY=31;COUNT=4");
        let starts = expand_all(&set, utc(2024, 1, 31, 12, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 31, 12, 0),
                utc(2024, 3, 31, 12, 0),
                utc(2024, 5, 31, 12, 0),
                utc(2024, 7, 31, 12, 0),
            ]
        );
    }

    #[test]
    fn monthly_default_day_also_skips_short_months() {
        let set = set_of("FREQ=MONTHLY;COUNT=3");
        let starts = expand_all(&set, utc(2024, 1, 31, 12, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 31, 12, 0),
                utc(2024, 3, 31, 12, 0),
                utc(2024, 5, 31, 12, 0),
            ]
        );
    }

    #[test]
    fn weekly_interval_two_keeps_phase() {
        let set = set_of("FREQ=WEEKLY;INTERVAL=2;COUNT=3");
        let starts = expand_all(&set, utc(2024, 1, 2, 9, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 2, 9, 0),
                utc(2024, 1, 16, 9, 0),
                utc(2024, 1, 30, 9, 0),
            ]
        );
    }

    #[test]
    fn monthly_last_monday() {
        let set = set_of("FREQ=MONTHLY;BYDAY=-1MO;COUNT=3");
        let starts = expand_all(&set, utc(2024, 1, 29, 10, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 29, 10, 0),
                utc(2024, 2, 26, 10, 0),
                utc(2024, 3, 25, 10, 0),
            ]
        );
    }

    #[test]
    fn monthly_by_month_day_intersected_with_by_day() {
        // Fridays that are the 13th
        let set = set_of("FREQ=MONTHLY;BYMONTHDAY=13;BYDAY=FR;COUNT=3");
        let starts = expand_all(&set, utc(2023, 1, 13, 0, 0));
        assert_eq!(
            starts,
            vec![
                utc(2023, 1, 13, 0, 0),
                utc(2023, 10, 13, 0, 0),
                utc(2024, 9, 13, 0, 0),
            ]
        );
    }

    #[test]
    fn by_set_pos_picks_last_weekday_of_month() {
        let set = set_of("FREQ=MONTHLY;BYDAY=MO,TU,WE,TH,FR;BYSETPOS=-1;COUNT=3");
        let starts = expand_all(&set, utc(2024, 1, 31, 8, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 31, 8, 0),
                utc(2024, 2, 29, 8, 0),
                utc(2024, 3, 29, 8, 0),
            ]
        );
    }

    #[test]
    fn until_bounds_the_series_inclusively() {
        let set = set_of("FREQ=DAILY;UNTIL=20240105T090000Z");
        let starts = expand_all(&set, utc(2024, 1, 2, 9, 0));
        assert_eq!(starts.len(), 4);
        assert_eq!(starts.last(), Some(&utc(2024, 1, 5, 9, 0)));
    }

    #[test]
    fn window_clips_but_count_still_counts_from_the_anchor() {
        let set = set_of("FREQ=DAILY;COUNT=5");
        let window = span(utc(2024, 1, 4, 0, 0), utc(2024, 2, 1, 0, 0));
        let starts = set
            .occurrences_between(utc(2024, 1, 2, 9, 0), &UTC, &window)
            .unwrap();
        // Jan 2 and Jan 3 are before the window; the series still ends Jan 6
        assert_eq!(
            starts,
            vec![utc(2024, 1, 4, 9, 0), utc(2024, 1, 5, 9, 0), utc(2024, 1, 6, 9, 0)]
        );
    }

    #[test]
    fn exdate_removes_exact_instants() {
        let set = RecurrenceSet::parse(
            Some("FREQ=DAILY;COUNT=5"),
            None,
            None,
            Some("20240604T100000Z"),
            &UTC,
        )
        .unwrap();
        let starts = expand_all(&set, utc(2024, 6, 3, 10, 0));
        assert_eq!(starts.len(), 4);
        assert!(!starts.contains(&utc(2024, 6, 4, 10, 0)));
    }

    #[test]
    fn exrule_subtracts_its_series() {
        let set = RecurrenceSet::parse(
            Some("FREQ=WEEKLY;BYDAY=TU,WE;COUNT=4"),
            None,
            Some("FREQ=WEEKLY;BYDAY=WE;COUNT=4"),
            None,
            &UTC,
        )
        .unwrap();
        // Anchor is a Wednesday, so it is excluded as well
        let starts = expand_all(&set, utc(2020, 1, 1, 9, 0));
        assert!(starts.iter().all(|d| d.with_timezone(&UTC).weekday() == Weekday::Tue));
        assert_eq!(starts.len(), 2);
    }

    #[test]
    fn rdate_union_is_sorted_and_deduplicated() {
        let set = RecurrenceSet::parse(
            Some("FREQ=DAILY;COUNT=2"),
            Some("20240110T090000Z,20240103T090000Z,20240103T090000Z"),
            None,
            None,
            &UTC,
        )
        .unwrap();
        let starts = expand_all(&set, utc(2024, 1, 2, 9, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 2, 9, 0),
                utc(2024, 1, 3, 9, 0),
                utc(2024, 1, 10, 9, 0),
            ]
        );
    }

    #[test]
    fn yearly_default_follows_the_anchor_date() {
        let set = set_of("FREQ=YEARLY;COUNT=3");
        let starts = expand_all(&set, utc(2024, 7, 4, 12, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 7, 4, 12, 0),
                utc(2025, 7, 4, 12, 0),
                utc(2026, 7, 4, 12, 0),
            ]
        );
    }

    #[test]
    fn yearly_feb_29_skips_common_years() {
        let set = set_of("FREQ=YEARLY;COUNT=3");
        let starts = expand_all(&set, utc(2024, 2, 29, 12, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 2, 29, 12, 0),
                utc(2028, 2, 29, 12, 0),
                utc(2032, 2, 29, 12, 0),
            ]
        );
    }

    #[test]
    fn daily_rule_keeps_wall_clock_across_dst() {
        let set = set_of("FREQ=DAILY;COUNT=3");
        let window = span(utc(2024, 3, 9, 0, 0), utc(2024, 3, 12, 0, 0));
        // 09:00 in Los Angeles: PST is UTC-8, PDT (from Mar 10) is UTC-7
        let starts = set
            .occurrences_between(utc(2024, 3, 9, 17, 0), &Los_Angeles, &window)
            .unwrap();
        assert_eq!(
            starts,
            vec![
                utc(2024, 3, 9, 17, 0),
                utc(2024, 3, 10, 16, 0),
                utc(2024, 3, 11, 16, 0),
            ]
        );
    }

    #[test]
    fn expansion_is_deterministic() {
        let set = set_of("FREQ=WEEKLY;BYDAY=MO,FR;COUNT=20");
        let a = expand_all(&set, utc(2024, 1, 1, 8, 0));
        let b = expand_all(&set, utc(2024, 1, 1, 8, 0));
        assert_eq!(a, b);
    }

    #[test]
    fn window_output_is_a_subset_of_the_full_expansion() {
        let set = set_of("FREQ=DAILY;COUNT=30");
        let all = expand_all(&set, utc(2024, 1, 1, 8, 0));
        let window = span(utc(2024, 1, 10, 0, 0), utc(2024, 1, 15, 0, 0));
        let subset = set
            .occurrences_between(utc(2024, 1, 1, 8, 0), &UTC, &window)
            .unwrap();
        assert!(!subset.is_empty());
        for d in &subset {
            assert!(all.contains(d));
            assert!(window.contains(*d));
        }
    }

    #[test]
    fn last_start_full_expansion_for_count() {
        let set = set_of("FREQ=WEEKLY;BYDAY=TU,TH;COUNT=6");
        let last = set.last_start(utc(2024, 1, 2, 9, 0), &UTC).unwrap();
        assert_eq!(last, Some(utc(2024, 1, 18, 9, 0)));
    }

    #[test]
    fn last_start_uses_until_without_expansion() {
        let set = set_of("FREQ=DAILY;UNTIL=20251231T000000Z");
        let last = set.last_start(utc(2024, 1, 2, 9, 0), &UTC).unwrap();
        assert_eq!(last, Some(utc(2025, 12, 31, 0, 0)));
    }

    #[test]
    fn last_start_is_none_for_unbounded_rules() {
        let set = set_of("FREQ=DAILY");
        let last = set.last_start(utc(2024, 1, 2, 9, 0), &UTC).unwrap();
        assert_eq!(last, None);
    }

    #[test]
    fn pre_epoch_anchor_is_out_of_range() {
        let set = set_of("FREQ=DAILY;COUNT=2");
        let window = span(utc(1970, 1, 1, 0, 0), utc(2100, 1, 1, 0, 0));
        let before_epoch = DateTime::from_timestamp_millis(-1).unwrap_or_default();
        let res = set.occurrences_between(before_epoch, &UTC, &window);
        assert!(matches!(res, Err(RecurrenceError::OutOfRange(_))));
    }

    #[test]
    fn hourly_steps_from_the_anchor() {
        let set = set_of("FREQ=HOURLY;INTERVAL=6;COUNT=4");
        let starts = expand_all(&set, utc(2024, 1, 2, 9, 0));
        assert_eq!(
            starts,
            vec![
                utc(2024, 1, 2, 9, 0),
                utc(2024, 1, 2, 15, 0),
                utc(2024, 1, 2, 21, 0),
                utc(2024, 1, 3, 3, 0),
            ]
        );
    }
}
