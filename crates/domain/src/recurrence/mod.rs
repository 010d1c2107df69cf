//! RFC 5545 recurrence: typed rules, property-value parsing and expansion.

mod duration;
mod expand;
mod rule;

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

pub use duration::EventDuration;
pub use rule::{Frequency, RecurrenceRule, WeekdayNum};

use crate::{TimeSpan, time::resolve_local};

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RecurrenceError {
    /// The recurrence property value could not be parsed; carries the
    /// offending substring.
    #[error("Invalid recurrence format: {0}")]
    InvalidFormat(String),
    /// A date outside the representable range (pre-epoch or past the
    /// 32-bit second horizon).
    #[error("Date out of range: {0}")]
    OutOfRange(i64),
}

/// The typed recurrence definition of an event:
/// `(RRULE ∪ RDATE) \ (EXRULE ∪ EXDATE)`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecurrenceSet {
    pub rrules: Vec<RecurrenceRule>,
    pub rdates: Vec<DateTime<Utc>>,
    pub exrules: Vec<RecurrenceRule>,
    pub exdates: Vec<DateTime<Utc>>,
}

impl RecurrenceSet {
    /// Parse the four recurrence columns of an event. Values without a
    /// trailing `Z` are interpreted in `tz` (the event timezone).
    pub fn parse(
        rrule: Option<&str>,
        rdate: Option<&str>,
        exrule: Option<&str>,
        exdate: Option<&str>,
        tz: &Tz,
    ) -> Result<Self, RecurrenceError> {
        Ok(Self {
            rrules: parse_rule_property(rrule)?,
            rdates: parse_date_list(rdate, tz)?,
            exrules: parse_rule_property(exrule)?,
            exdates: parse_date_list(exdate, tz)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.rrules.is_empty() && self.rdates.is_empty()
    }

    /// False iff some RRULE has neither COUNT nor UNTIL.
    pub fn is_bounded(&self) -> bool {
        self.rrules.iter().all(|r| r.is_bounded())
    }

    /// Occurrence starts inside `window`, sorted ascending, in UTC.
    pub fn occurrences_between(
        &self,
        dtstart: DateTime<Utc>,
        tz: &Tz,
        window: &TimeSpan,
    ) -> Result<Vec<DateTime<Utc>>, RecurrenceError> {
        expand::expand_set(self, dtstart, tz, Some(window))
    }

    /// Start of the final occurrence; `None` when the set recurs forever.
    ///
    /// COUNT rules are fully expanded; UNTIL rules answer with their bound
    /// without expanding.
    pub fn last_start(
        &self,
        dtstart: DateTime<Utc>,
        tz: &Tz,
    ) -> Result<Option<DateTime<Utc>>, RecurrenceError> {
        expand::last_start(self, dtstart, tz)
    }
}

fn parse_rule_property(value: Option<&str>) -> Result<Vec<RecurrenceRule>, RecurrenceError> {
    let mut rules = Vec::new();
    if let Some(value) = value {
        // A column may carry several rules, one per line
        for line in value.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            rules.push(line.parse::<RecurrenceRule>()?);
        }
    }
    Ok(rules)
}

/// Parse a comma-separated RDATE/EXDATE value list.
fn parse_date_list(
    value: Option<&str>,
    tz: &Tz,
) -> Result<Vec<DateTime<Utc>>, RecurrenceError> {
    let mut out = Vec::new();
    if let Some(value) = value {
        for part in value.split(',') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            out.push(parse_ical_datetime(part, tz)?);
        }
    }
    out.sort_unstable();
    Ok(out)
}

/// Parse an iCalendar basic-format date or date-time value
/// (`YYYYMMDD[THHMMSS[Z]]`). Values ending in `Z` are UTC; floating values
/// are resolved in `tz`.
pub(crate) fn parse_ical_datetime(value: &str, tz: &Tz) -> Result<DateTime<Utc>, RecurrenceError> {
    let bad = || RecurrenceError::InvalidFormat(value.to_string());
    if !value.is_ascii() {
        return Err(bad());
    }

    let (body, is_utc) = match value.strip_suffix('Z') {
        Some(body) => (body, true),
        None => (value, false),
    };

    let naive: NaiveDateTime = if let Some((date, time)) = body.split_once('T') {
        if date.len() != 8 || time.len() != 6 {
            return Err(bad());
        }
        let date = parse_basic_date(date).ok_or_else(bad)?;
        let (h, m, s) = (
            time[0..2].parse::<u32>().map_err(|_| bad())?,
            time[2..4].parse::<u32>().map_err(|_| bad())?,
            time[4..6].parse::<u32>().map_err(|_| bad())?,
        );
        date.and_hms_opt(h, m, s).ok_or_else(bad)?
    } else {
        if body.len() != 8 {
            return Err(bad());
        }
        parse_basic_date(body)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .ok_or_else(bad)?
    };

    if is_utc {
        Ok(Utc.from_utc_datetime(&naive))
    } else {
        Ok(resolve_local(naive, tz).with_timezone(&Utc))
    }
}

fn parse_basic_date(s: &str) -> Option<NaiveDate> {
    let y = s[0..4].parse::<i32>().ok()?;
    let m = s[4..6].parse::<u32>().ok()?;
    let d = s[6..8].parse::<u32>().ok()?;
    NaiveDate::from_ymd_opt(y, m, d)
}

#[cfg(test)]
mod test {
    use chrono_tz::{America::New_York, UTC};

    use super::*;

    #[test]
    fn parses_utc_and_floating_values() {
        let utc = parse_ical_datetime("20240610T120000Z", &New_York).unwrap();
        assert_eq!(utc.timestamp(), 1718020800);

        // Floating value resolves in the passed zone (EDT = UTC-4)
        let floating = parse_ical_datetime("20240610T120000", &New_York).unwrap();
        assert_eq!(floating.timestamp(), 1718020800 + 4 * 3600);

        // Date-only values land on midnight
        let date = parse_ical_datetime("20240610", &UTC).unwrap();
        assert_eq!(date.timestamp() % 86_400, 0);
    }

    #[test]
    fn rejects_malformed_values() {
        assert!(parse_ical_datetime("2024-06-10", &UTC).is_err());
        assert!(parse_ical_datetime("20240610T1200", &UTC).is_err());
        assert!(parse_ical_datetime("20241310T120000Z", &UTC).is_err());
    }

    #[test]
    fn date_lists_are_sorted() {
        let dates =
            parse_date_list(Some("20240612T090000Z,20240610T090000Z"), &UTC).unwrap();
        assert_eq!(dates.len(), 2);
        assert!(dates[0] < dates[1]);
    }

    #[test]
    fn multi_line_rule_property() {
        let rules =
            parse_rule_property(Some("FREQ=DAILY;COUNT=3\nFREQ=WEEKLY;BYDAY=MO")).unwrap();
        assert_eq!(rules.len(), 2);
    }
}
