use std::str::FromStr;

use chrono::{DateTime, Utc, Weekday};
use chrono_tz::UTC;

use super::{RecurrenceError, parse_ical_datetime};

/// Recurrence cadence, finest to coarsest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Frequency {
    Secondly,
    Minutely,
    Hourly,
    Daily,
    Weekly,
    Monthly,
    Yearly,
}

impl Frequency {
    fn from_part(s: &str) -> Option<Self> {
        Some(match s {
            "SECONDLY" => Self::Secondly,
            "MINUTELY" => Self::Minutely,
            "HOURLY" => Self::Hourly,
            "DAILY" => Self::Daily,
            "WEEKLY" => Self::Weekly,
            "MONTHLY" => Self::Monthly,
            "YEARLY" => Self::Yearly,
            _ => return None,
        })
    }

    pub fn is_sub_daily(&self) -> bool {
        matches!(self, Self::Secondly | Self::Minutely | Self::Hourly)
    }
}

/// A BYDAY entry: weekday plus an optional signed ordinal
/// (`-1MO` = last Monday of the period; ordinal 0 = every).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekdayNum {
    pub ordinal: i32,
    pub weekday: Weekday,
}

impl WeekdayNum {
    pub fn every(weekday: Weekday) -> Self {
        Self {
            ordinal: 0,
            weekday,
        }
    }

    pub fn nth(ordinal: i32, weekday: Weekday) -> Self {
        Self { ordinal, weekday }
    }
}

// Weekday codes in canonical expansion order MO..SU -> 0..6; the chrono
// weekday is the fixed table the wall-clock side uses.
const WEEKDAY_CODES: [(&str, Weekday); 7] = [
    ("MO", Weekday::Mon),
    ("TU", Weekday::Tue),
    ("WE", Weekday::Wed),
    ("TH", Weekday::Thu),
    ("FR", Weekday::Fri),
    ("SA", Weekday::Sat),
    ("SU", Weekday::Sun),
];

fn weekday_from_code(code: &str) -> Option<Weekday> {
    WEEKDAY_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, w)| *w)
}

impl FromStr for WeekdayNum {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || RecurrenceError::InvalidFormat(s.to_string());
        if s.len() < 2 || !s.is_ascii() {
            return Err(bad());
        }
        let (num, code) = s.split_at(s.len() - 2);
        let weekday = weekday_from_code(code).ok_or_else(bad)?;
        let ordinal = if num.is_empty() {
            0
        } else {
            let n = num.parse::<i32>().map_err(|_| bad())?;
            if n == 0 || !(-53..=53).contains(&n) {
                return Err(bad());
            }
            n
        };
        Ok(Self { ordinal, weekday })
    }
}

/// A typed RRULE / EXRULE.
#[derive(Debug, Clone, PartialEq)]
pub struct RecurrenceRule {
    pub freq: Frequency,
    pub interval: u32,
    pub count: Option<u32>,
    pub until: Option<DateTime<Utc>>,
    pub week_start: Weekday,
    pub by_month: Vec<u32>,
    pub by_week_no: Vec<i32>,
    pub by_year_day: Vec<i32>,
    pub by_month_day: Vec<i32>,
    pub by_day: Vec<WeekdayNum>,
    pub by_hour: Vec<u32>,
    pub by_minute: Vec<u32>,
    pub by_second: Vec<u32>,
    pub by_set_pos: Vec<i32>,
}

impl RecurrenceRule {
    pub fn new(freq: Frequency) -> Self {
        Self {
            freq,
            interval: 1,
            count: None,
            until: None,
            week_start: Weekday::Mon,
            by_month: Vec::new(),
            by_week_no: Vec::new(),
            by_year_day: Vec::new(),
            by_month_day: Vec::new(),
            by_day: Vec::new(),
            by_hour: Vec::new(),
            by_minute: Vec::new(),
            by_second: Vec::new(),
            by_set_pos: Vec::new(),
        }
    }

    /// A rule without COUNT and UNTIL recurs forever.
    pub fn is_bounded(&self) -> bool {
        self.count.is_some() || self.until.is_some()
    }

    fn validate(&self, source: &str) -> Result<(), RecurrenceError> {
        let bad = || RecurrenceError::InvalidFormat(source.to_string());
        if self.interval == 0 {
            return Err(bad());
        }
        if self.count.is_some() && self.until.is_some() {
            // RFC 5545: COUNT and UNTIL MUST NOT occur in the same recur
            return Err(bad());
        }
        if self.count == Some(0) {
            return Err(bad());
        }
        // Ordinal BYDAY entries only make sense against a month or a year
        if !matches!(self.freq, Frequency::Monthly | Frequency::Yearly)
            && self.by_day.iter().any(|d| d.ordinal != 0)
        {
            return Err(bad());
        }
        Ok(())
    }
}

fn parse_int_list<T: FromStr + Copy>(
    value: &str,
    valid: impl Fn(T) -> bool,
) -> Result<Vec<T>, ()> {
    let mut out = Vec::new();
    for part in value.split(',') {
        let n = part.trim().parse::<T>().map_err(|_| ())?;
        if !valid(n) {
            return Err(());
        }
        out.push(n);
    }
    Ok(out)
}

impl FromStr for RecurrenceRule {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut freq = None;
        let mut rule = RecurrenceRule::new(Frequency::Daily);

        for part in s.split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let bad = || RecurrenceError::InvalidFormat(part.to_string());
            let (name, value) = part.split_once('=').ok_or_else(bad)?;
            match name.to_ascii_uppercase().as_str() {
                "FREQ" => freq = Some(Frequency::from_part(value).ok_or_else(bad)?),
                "INTERVAL" => rule.interval = value.parse::<u32>().map_err(|_| bad())?,
                "COUNT" => rule.count = Some(value.parse::<u32>().map_err(|_| bad())?),
                "UNTIL" => rule.until = Some(parse_ical_datetime(value, &UTC)?),
                "WKST" => rule.week_start = weekday_from_code(value).ok_or_else(bad)?,
                "BYMONTH" => {
                    rule.by_month =
                        parse_int_list(value, |n: u32| (1..=12).contains(&n)).map_err(|_| bad())?
                }
                "BYWEEKNO" => {
                    rule.by_week_no = parse_int_list(value, |n: i32| {
                        n != 0 && (-53..=53).contains(&n)
                    })
                    .map_err(|_| bad())?
                }
                "BYYEARDAY" => {
                    rule.by_year_day = parse_int_list(value, |n: i32| {
                        n != 0 && (-366..=366).contains(&n)
                    })
                    .map_err(|_| bad())?
                }
                "BYMONTHDAY" => {
                    rule.by_month_day = parse_int_list(value, |n: i32| {
                        n != 0 && (-31..=31).contains(&n)
                    })
                    .map_err(|_| bad())?
                }
                "BYDAY" => {
                    let mut days = Vec::new();
                    for day in value.split(',') {
                        days.push(day.trim().parse::<WeekdayNum>()?);
                    }
                    rule.by_day = days;
                }
                "BYHOUR" => {
                    rule.by_hour =
                        parse_int_list(value, |n: u32| n <= 23).map_err(|_| bad())?
                }
                "BYMINUTE" => {
                    rule.by_minute =
                        parse_int_list(value, |n: u32| n <= 59).map_err(|_| bad())?
                }
                "BYSECOND" => {
                    rule.by_second =
                        parse_int_list(value, |n: u32| n <= 59).map_err(|_| bad())?
                }
                "BYSETPOS" => {
                    rule.by_set_pos = parse_int_list(value, |n: i32| {
                        n != 0 && (-366..=366).contains(&n)
                    })
                    .map_err(|_| bad())?
                }
                _ => return Err(bad()),
            }
        }

        rule.freq = freq.ok_or_else(|| RecurrenceError::InvalidFormat(s.to_string()))?;
        rule.validate(s)?;
        Ok(rule)
    }
}
