use std::convert::TryFrom;

use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::{
    id::ID,
    recurrence::{EventDuration, RecurrenceError, RecurrenceSet},
    timespan::TimeSpan,
};

#[derive(Debug, Default, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum EventStatus {
    #[default]
    Tentative,
    Confirmed,
    Cancelled,
}

impl From<EventStatus> for String {
    fn from(e: EventStatus) -> Self {
        match e {
            EventStatus::Tentative => "tentative".into(),
            EventStatus::Confirmed => "confirmed".into(),
            EventStatus::Cancelled => "cancelled".into(),
        }
    }
}

impl TryFrom<String> for EventStatus {
    type Error = anyhow::Error;
    fn try_from(e: String) -> anyhow::Result<EventStatus> {
        Ok(match &e[..] {
            "tentative" => EventStatus::Tentative,
            "confirmed" => EventStatus::Confirmed,
            "cancelled" => EventStatus::Cancelled,
            _ => Err(anyhow::anyhow!("Invalid status"))?,
        })
    }
}

/// A calendar event row.
///
/// Times: recurring events carry `duration` and a null `dtend`; standalone
/// events the reverse. All-day events live at UTC midnight with whole-day
/// durations. An event referencing `original_sync_id` +
/// `original_instance_time` is a recurrence exception overriding exactly
/// one occurrence of its base series.
#[derive(Debug, Clone)]
pub struct CalendarEvent {
    pub id: ID,
    pub calendar_id: ID,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: EventStatus,
    pub dtstart: DateTime<Utc>,
    pub dtend: Option<DateTime<Utc>>,
    pub duration: Option<EventDuration>,
    pub event_timezone: Tz,
    pub all_day: bool,
    pub rrule: Option<String>,
    pub rdate: Option<String>,
    pub exrule: Option<String>,
    pub exdate: Option<String>,
    pub sync_id: Option<String>,
    pub original_sync_id: Option<String>,
    pub original_instance_time: Option<DateTime<Utc>>,
    pub original_all_day: bool,
    /// End of the final occurrence; null iff the event recurs forever.
    pub last_date: Option<DateTime<Utc>>,
    pub deleted: bool,
    pub sync_dirty: bool,
    pub self_attendee_status: crate::AttendeeStatus,
}

impl Default for CalendarEvent {
    fn default() -> Self {
        Self {
            id: Default::default(),
            calendar_id: Default::default(),
            title: None,
            description: None,
            location: None,
            status: Default::default(),
            dtstart: DateTime::<Utc>::UNIX_EPOCH,
            dtend: None,
            duration: None,
            event_timezone: chrono_tz::UTC,
            all_day: false,
            rrule: None,
            rdate: None,
            exrule: None,
            exdate: None,
            sync_id: None,
            original_sync_id: None,
            original_instance_time: None,
            original_all_day: false,
            last_date: None,
            deleted: false,
            sync_dirty: false,
            self_attendee_status: Default::default(),
        }
    }
}

impl CalendarEvent {
    pub fn is_recurring(&self) -> bool {
        self.rrule.is_some() || self.rdate.is_some()
    }

    pub fn is_exception(&self) -> bool {
        self.original_sync_id.is_some() || self.original_instance_time.is_some()
    }

    /// Sentinel marking an event whose dtstart fell outside the
    /// representable range; skipped by expansion.
    pub fn is_out_of_range(&self) -> bool {
        self.dtstart.timestamp_millis() < 0
    }

    /// The zone the recurrence is anchored in; all-day events always expand
    /// in UTC.
    pub fn expansion_timezone(&self) -> Tz {
        if self.all_day {
            chrono_tz::UTC
        } else {
            self.event_timezone
        }
    }

    /// Length of one occurrence in milliseconds.
    pub fn occurrence_duration_millis(&self) -> i64 {
        match (&self.duration, &self.dtend) {
            (Some(duration), _) => duration.millis(),
            (None, Some(dtend)) => (*dtend - self.dtstart).num_milliseconds(),
            (None, None) => 0,
        }
    }

    /// Calendar-scoped key matching exceptions to their base event even
    /// when sync ids collide across calendars.
    pub fn sync_key(&self) -> Option<String> {
        let base_sync_id = self.original_sync_id.as_ref().or(self.sync_id.as_ref())?;
        Some(format!("{}:{}", self.calendar_id, base_sync_id))
    }

    pub fn recurrence_set(&self) -> Result<RecurrenceSet, RecurrenceError> {
        RecurrenceSet::parse(
            self.rrule.as_deref(),
            self.rdate.as_deref(),
            self.exrule.as_deref(),
            self.exdate.as_deref(),
            &self.expansion_timezone(),
        )
    }

    /// Occurrence starts inside `window`, sorted, in UTC.
    ///
    /// Non-recurring events produce at most their own `dtstart`.
    pub fn expand(&self, window: &TimeSpan) -> Result<Vec<DateTime<Utc>>, RecurrenceError> {
        let set = self.recurrence_set()?;
        if set.is_empty() {
            if window.contains(self.dtstart) && !set.exdates.contains(&self.dtstart) {
                return Ok(vec![self.dtstart]);
            }
            return Ok(Vec::new());
        }
        set.occurrences_between(self.dtstart, &self.expansion_timezone(), window)
    }

    /// End instant of the final occurrence, or `None` when the event recurs
    /// forever. COUNT rules require a full expansion; UNTIL rules answer
    /// from their bound.
    pub fn compute_last_date(&self) -> Result<Option<DateTime<Utc>>, RecurrenceError> {
        let duration = TimeDelta::milliseconds(self.occurrence_duration_millis());
        if !self.is_recurring() {
            return Ok(Some(
                self.dtend.unwrap_or_else(|| self.dtstart + duration),
            ));
        }
        let set = self.recurrence_set()?;
        Ok(set
            .last_start(self.dtstart, &self.expansion_timezone())?
            .map(|last| last + duration))
    }
}

#[cfg(test)]
mod test {
    use chrono::TimeZone;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn hour_event(dtstart: DateTime<Utc>) -> CalendarEvent {
        CalendarEvent {
            dtstart,
            dtend: Some(dtstart + TimeDelta::hours(1)),
            ..Default::default()
        }
    }

    #[test]
    fn non_recurring_event_expands_to_itself() {
        let start = utc(2024, 1, 2, 9, 0);
        let event = hour_event(start);
        let window = TimeSpan::new(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0));
        let starts = event.expand(&window).unwrap();
        assert_eq!(starts, vec![start]);

        let miss = TimeSpan::new(utc(2024, 2, 1, 0, 0), utc(2024, 3, 1, 0, 0));
        let starts = event.expand(&miss).unwrap();
        assert!(starts.is_empty());
    }

    #[test]
    fn exdate_on_a_non_recurring_event_cancels_it() {
        let start = utc(2024, 1, 2, 9, 0);
        let event = CalendarEvent {
            exdate: Some("20240102T090000Z".into()),
            ..hour_event(start)
        };
        let window = TimeSpan::new(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0));
        let starts = event.expand(&window).unwrap();
        assert!(starts.is_empty());
    }

    #[test]
    fn weekly_count_series_and_last_date() {
        let event = CalendarEvent {
            dtstart: utc(2024, 1, 2, 9, 0),
            duration: Some(
                "P1H".parse().unwrap(),
            ),
            rrule: Some("FREQ=WEEKLY;BYDAY=TU,TH;COUNT=6".into()),
            ..Default::default()
        };
        let window = TimeSpan::new(utc(2024, 1, 1, 0, 0), utc(2024, 2, 1, 0, 0));
        let starts = event.expand(&window).unwrap();
        assert_eq!(starts.len(), 6);
        assert_eq!(starts[0], event.dtstart);

        let last_date = event.compute_last_date().unwrap();
        assert_eq!(last_date, Some(utc(2024, 1, 18, 10, 0)));
    }

    #[test]
    fn unbounded_recurrence_has_no_last_date() {
        let event = CalendarEvent {
            dtstart: utc(2024, 1, 2, 9, 0),
            duration: Some(EventDuration::from_seconds(3600)),
            rrule: Some("FREQ=DAILY".into()),
            ..Default::default()
        };
        let last_date = event.compute_last_date().unwrap();
        assert_eq!(last_date, None);
    }

    #[test]
    fn non_recurring_last_date_is_its_end() {
        let start = utc(2024, 1, 2, 9, 0);
        let event = hour_event(start);
        let last_date = event.compute_last_date().unwrap();
        assert_eq!(last_date, Some(utc(2024, 1, 2, 10, 0)));
    }

    #[test]
    fn sync_keys_are_calendar_scoped() {
        let base = CalendarEvent {
            sync_id: Some("abc".into()),
            ..Default::default()
        };
        let exception = CalendarEvent {
            calendar_id: base.calendar_id.clone(),
            original_sync_id: Some("abc".into()),
            original_instance_time: Some(utc(2024, 1, 2, 9, 0)),
            ..Default::default()
        };
        assert_eq!(base.sync_key(), exception.sync_key());
        assert!(exception.is_exception());

        let other_calendar = CalendarEvent {
            sync_id: Some("abc".into()),
            ..Default::default()
        };
        assert_ne!(base.sync_key(), other_calendar.sync_key());
    }
}
