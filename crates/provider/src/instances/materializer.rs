//! Turns the events touching a window into concrete Instance rows.

use std::collections::HashMap;

use almanac_domain::{CalendarEvent, EventStatus, ID, Instance, TimeSpan};
use almanac_infra::AlmanacContext;
use chrono::{DateTime, TimeDelta, Utc};
use chrono_tz::Tz;
use tracing::warn;

/// Recurrence exceptions are considered when their original time falls in
/// the window extended backward by this much, so an exception whose own
/// instance lies elsewhere still cancels the right occurrence.
pub(crate) const MAX_ASSUMED_DURATION_MS: i64 = 7 * 24 * 60 * 60 * 1000;

/// Enumerate and expand every event that can touch
/// `[window_start, window_end]`, returning the instance rows to store.
pub(crate) async fn materialize_window(
    ctx: &AlmanacContext,
    window_start: i64,
    window_end: i64,
    instances_tz: &Tz,
) -> anyhow::Result<Vec<Instance>> {
    let events = ctx
        .repos
        .events
        .find_for_window(window_start, window_end, MAX_ASSUMED_DURATION_MS)
        .await?;
    Ok(materialize_events(
        &events,
        window_start,
        window_end,
        instances_tz,
    ))
}

struct Buffered {
    event_id: ID,
    all_day: bool,
    begin: DateTime<Utc>,
    end: DateTime<Utc>,
    removed: bool,
}

/// Expand base events, apply recurrence exceptions, compute derived fields.
///
/// Exceptions are matched into their base event's bucket by the
/// calendar-scoped sync key; each exception removes exactly the buffered
/// occurrence whose begin equals its original instance time. A cancelled
/// exception contributes nothing further; any other exception flows through
/// expansion as its own event.
pub(crate) fn materialize_events(
    events: &[CalendarEvent],
    window_start: i64,
    window_end: i64,
    instances_tz: &Tz,
) -> Vec<Instance> {
    let window = TimeSpan::from_millis(window_start, window_end);

    let mut buffered: Vec<Buffered> = Vec::new();
    let mut buckets: HashMap<String, Vec<usize>> = HashMap::new();

    for event in events.iter().filter(|e| !e.is_exception()) {
        if let Some(key) = event.sync_key() {
            buckets.entry(key).or_default();
        }
        if event.status == EventStatus::Cancelled {
            continue;
        }
        buffer_event(event, &window, &mut buffered, &mut buckets);
    }

    for exception in events.iter().filter(|e| e.is_exception()) {
        if let (Some(key), Some(original)) = (exception.sync_key(), exception.original_instance_time)
        {
            let mut hit = None;
            if let Some(indexes) = buckets.get(&key) {
                for &i in indexes {
                    if !buffered[i].removed && buffered[i].begin == original {
                        hit = Some(i);
                        break;
                    }
                }
            }
            if let Some(i) = hit {
                buffered[i].removed = true;
            }
        }
        if exception.status == EventStatus::Cancelled {
            continue;
        }
        buffer_event(exception, &window, &mut buffered, &mut HashMap::new());
    }

    buffered
        .into_iter()
        .filter(|b| !b.removed)
        .map(|b| {
            let tz = if b.all_day { &chrono_tz::UTC } else { instances_tz };
            Instance::new(b.event_id, b.begin, b.end, tz)
        })
        .collect()
}

fn buffer_event(
    event: &CalendarEvent,
    window: &TimeSpan,
    buffered: &mut Vec<Buffered>,
    buckets: &mut HashMap<String, Vec<usize>>,
) {
    if event.is_out_of_range() {
        return;
    }
    let starts = match event.expand(window) {
        Ok(starts) => starts,
        Err(err) => {
            // A malformed recurrence skips this event only; the rest of the
            // window still materializes
            warn!(
                event_id = %event.id,
                error = %err,
                "Skipping event with invalid recurrence"
            );
            return;
        }
    };
    let duration = TimeDelta::milliseconds(event.occurrence_duration_millis());
    for begin in starts {
        let end = match (event.is_recurring(), event.dtend) {
            (false, Some(dtend)) => dtend,
            _ => begin + duration,
        };
        let idx = buffered.len();
        buffered.push(Buffered {
            event_id: event.id.clone(),
            all_day: event.all_day,
            begin,
            end,
            removed: false,
        });
        if let Some(key) = event.sync_key() {
            buckets.entry(key).or_default().push(idx);
        }
    }
}

#[cfg(test)]
mod test {
    use almanac_domain::EventDuration;
    use chrono::TimeZone;
    use chrono_tz::UTC;

    use super::*;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    fn daily_base(sync_id: &str) -> CalendarEvent {
        CalendarEvent {
            dtstart: utc(2024, 6, 3, 10, 0),
            duration: Some(EventDuration::from_seconds(3600)),
            rrule: Some("FREQ=DAILY;COUNT=5".into()),
            sync_id: Some(sync_id.into()),
            ..Default::default()
        }
    }

    fn window_ms(start: DateTime<Utc>, end: DateTime<Utc>) -> (i64, i64) {
        (start.timestamp_millis(), end.timestamp_millis())
    }

    #[test]
    fn cancelling_exception_removes_exactly_one_occurrence() {
        let base = daily_base("s1");
        let exception = CalendarEvent {
            calendar_id: base.calendar_id.clone(),
            dtstart: utc(2024, 6, 4, 10, 0),
            dtend: Some(utc(2024, 6, 4, 11, 0)),
            status: EventStatus::Cancelled,
            original_sync_id: Some("s1".into()),
            original_instance_time: Some(utc(2024, 6, 4, 10, 0)),
            ..Default::default()
        };
        let (ws, we) = window_ms(utc(2024, 6, 1, 0, 0), utc(2024, 6, 10, 0, 0));
        let instances = materialize_events(&[base, exception], ws, we, &UTC);
        assert_eq!(instances.len(), 4);
        assert!(
            instances
                .iter()
                .all(|i| i.begin != utc(2024, 6, 4, 10, 0))
        );
    }

    #[test]
    fn modifying_exception_replaces_the_occurrence() {
        let base = daily_base("s1");
        let base_id = base.id.clone();
        let exception = CalendarEvent {
            calendar_id: base.calendar_id.clone(),
            dtstart: utc(2024, 6, 4, 15, 0),
            dtend: Some(utc(2024, 6, 4, 16, 0)),
            original_sync_id: Some("s1".into()),
            original_instance_time: Some(utc(2024, 6, 4, 10, 0)),
            ..Default::default()
        };
        let exception_id = exception.id.clone();
        let (ws, we) = window_ms(utc(2024, 6, 1, 0, 0), utc(2024, 6, 10, 0, 0));
        let instances = materialize_events(&[base, exception], ws, we, &UTC);
        assert_eq!(instances.len(), 5);
        assert!(
            instances
                .iter()
                .any(|i| i.event_id == exception_id && i.begin == utc(2024, 6, 4, 15, 0))
        );
        assert!(
            instances
                .iter()
                .filter(|i| i.event_id == base_id)
                .all(|i| i.begin != utc(2024, 6, 4, 10, 0))
        );
    }

    #[test]
    fn sync_id_collisions_across_calendars_do_not_cancel() {
        // Same sync id, different calendar: the exception must not touch it
        let base = daily_base("s1");
        let exception = CalendarEvent {
            // calendar_id defaults to a fresh uuid, i.e. another calendar
            dtstart: utc(2024, 6, 4, 10, 0),
            dtend: Some(utc(2024, 6, 4, 11, 0)),
            status: EventStatus::Cancelled,
            original_sync_id: Some("s1".into()),
            original_instance_time: Some(utc(2024, 6, 4, 10, 0)),
            ..Default::default()
        };
        let (ws, we) = window_ms(utc(2024, 6, 1, 0, 0), utc(2024, 6, 10, 0, 0));
        let instances = materialize_events(&[base, exception], ws, we, &UTC);
        assert_eq!(instances.len(), 5);
    }

    #[test]
    fn cancelled_base_events_produce_nothing() {
        let base = CalendarEvent {
            status: EventStatus::Cancelled,
            ..daily_base("s1")
        };
        let (ws, we) = window_ms(utc(2024, 6, 1, 0, 0), utc(2024, 6, 10, 0, 0));
        let instances = materialize_events(&[base], ws, we, &UTC);
        assert!(instances.is_empty());
    }

    #[test]
    fn malformed_recurrence_skips_only_that_event() {
        let good = daily_base("s1");
        let bad = CalendarEvent {
            rrule: Some("FREQ=NEVER".into()),
            ..daily_base("s2")
        };
        let (ws, we) = window_ms(utc(2024, 6, 1, 0, 0), utc(2024, 6, 10, 0, 0));
        let instances = materialize_events(&[good, bad], ws, we, &UTC);
        assert_eq!(instances.len(), 5);
    }

    #[test]
    fn all_day_instances_derive_fields_in_utc() {
        let event = CalendarEvent {
            dtstart: utc(2024, 3, 10, 0, 0),
            duration: Some(EventDuration::from_days(1)),
            rdate: None,
            all_day: true,
            dtend: None,
            ..Default::default()
        };
        let (ws, we) = window_ms(utc(2024, 3, 9, 0, 0), utc(2024, 3, 12, 0, 0));
        let instances =
            materialize_events(&[event], ws, we, &chrono_tz::America::Los_Angeles);
        assert_eq!(instances.len(), 1);
        let instance = &instances[0];
        // Derived in UTC by the all-day rule, one whole day
        assert_eq!(instance.start_minute, 0);
        assert_eq!(instance.end_minute, 24 * 60);
        assert_eq!(instance.start_day, instance.end_day);
    }
}
