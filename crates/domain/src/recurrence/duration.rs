use std::{fmt::Display, str::FromStr};

use super::RecurrenceError;

const SECONDS_PER_DAY: i64 = 24 * 60 * 60;

/// An RFC 2445 DURATION property value:
/// `[+-]P[nW][nD][T[nH][nM][nS]]`.
///
/// Recurring events carry their length as a duration instead of an end
/// time, so each occurrence can derive its own end.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EventDuration {
    negative: bool,
    weeks: u32,
    days: u32,
    hours: u32,
    minutes: u32,
    seconds: u32,
}

impl EventDuration {
    pub fn from_days(days: u32) -> Self {
        Self {
            days,
            ..Default::default()
        }
    }

    pub fn from_seconds(seconds: u32) -> Self {
        Self {
            seconds,
            ..Default::default()
        }
    }

    pub fn from_millis(ms: i64) -> Self {
        let negative = ms < 0;
        let total_seconds = (ms.abs() / 1000) as u32;
        Self {
            negative,
            seconds: total_seconds,
            ..Default::default()
        }
    }

    pub fn millis(&self) -> i64 {
        let seconds = i64::from(self.weeks) * 7 * SECONDS_PER_DAY
            + i64::from(self.days) * SECONDS_PER_DAY
            + i64::from(self.hours) * 3600
            + i64::from(self.minutes) * 60
            + i64::from(self.seconds);
        let ms = seconds * 1000;
        if self.negative { -ms } else { ms }
    }

    /// True when the duration is an integral number of days, the only form
    /// an all-day event may carry.
    pub fn is_whole_days(&self) -> bool {
        self.hours == 0 && self.minutes == 0 && self.seconds % SECONDS_PER_DAY as u32 == 0
    }

    /// Round up to whole days, the normalization applied to all-day events
    /// that were handed a seconds-form duration.
    pub fn ceil_to_days(&self) -> Self {
        let ms = self.millis().abs();
        let days = ms.div_euclid(SECONDS_PER_DAY * 1000)
            + i64::from(ms.rem_euclid(SECONDS_PER_DAY * 1000) != 0);
        Self {
            negative: self.negative,
            weeks: 0,
            days: days as u32,
            hours: 0,
            minutes: 0,
            seconds: 0,
        }
    }
}

impl FromStr for EventDuration {
    type Err = RecurrenceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bad = || RecurrenceError::InvalidFormat(s.to_string());

        let mut chars = s.chars().peekable();
        let negative = match chars.peek() {
            Some('-') => {
                chars.next();
                true
            }
            Some('+') => {
                chars.next();
                false
            }
            _ => false,
        };
        if chars.next() != Some('P') {
            return Err(bad());
        }

        let mut out = EventDuration {
            negative,
            ..Default::default()
        };
        let mut value: Option<u32> = None;
        for c in chars {
            match c {
                '0'..='9' => {
                    let d = c as u32 - '0' as u32;
                    value = Some(
                        value
                            .unwrap_or(0)
                            .checked_mul(10)
                            .and_then(|v| v.checked_add(d))
                            .ok_or_else(bad)?,
                    );
                }
                'T' => {
                    if value.is_some() {
                        return Err(bad());
                    }
                }
                'W' => out.weeks = value.take().ok_or_else(bad)?,
                'D' => out.days = value.take().ok_or_else(bad)?,
                'H' => out.hours = value.take().ok_or_else(bad)?,
                'M' => out.minutes = value.take().ok_or_else(bad)?,
                'S' => out.seconds = value.take().ok_or_else(bad)?,
                _ => return Err(bad()),
            }
        }
        // A trailing number without a designator is malformed
        if value.is_some() {
            return Err(bad());
        }
        Ok(out)
    }
}

impl Display for EventDuration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.negative {
            write!(f, "-")?;
        }
        write!(f, "P")?;
        if self.weeks > 0 {
            write!(f, "{}W", self.weeks)?;
        }
        if self.days > 0 {
            write!(f, "{}D", self.days)?;
        }
        if self.hours > 0 || self.minutes > 0 || self.seconds > 0 {
            write!(f, "T")?;
            if self.hours > 0 {
                write!(f, "{}H", self.hours)?;
            }
            if self.minutes > 0 {
                write!(f, "{}M", self.minutes)?;
            }
            if self.seconds > 0 {
                write!(f, "{}S", self.seconds)?;
            }
        }
        if self.weeks == 0
            && self.days == 0
            && self.hours == 0
            && self.minutes == 0
            && self.seconds == 0
        {
            write!(f, "T0S")?;
        }
        Ok(())
    }
}
