mod create_event;
mod delete_event;
mod update_event;

use almanac_domain::{CalendarEvent, EventDuration, time};
use chrono::DateTime;
pub use create_event::{CreateEventUseCase, EventPayload};
pub use delete_event::DeleteEventUseCase;
use tracing::warn;
pub use update_event::{UpdateEventChanges, UpdateEventUseCase};

use crate::error::ProviderError;

#[derive(Debug)]
pub enum EventUseCaseError {
    InvalidArgument(String),
    CalendarNotFound,
    EventNotFound,
    StorageError,
}

impl From<EventUseCaseError> for ProviderError {
    fn from(e: EventUseCaseError) -> Self {
        match e {
            EventUseCaseError::InvalidArgument(msg) => Self::InvalidArgument(msg),
            EventUseCaseError::CalendarNotFound => Self::NotFound("calendar".into()),
            EventUseCaseError::EventNotFound => Self::NotFound("event".into()),
            EventUseCaseError::StorageError => {
                Self::Transient(anyhow::anyhow!("event storage failure"))
            }
        }
    }
}

/// Enforce the event invariants in place, deriving what can be derived:
///
/// - exactly one of `{dtend, duration}` survives, durations on recurring
///   events and end times on standalone ones;
/// - all-day events are pinned to UTC midnight with whole-day durations;
/// - exception linkage is either complete or absent;
/// - `last_date` is recomputed, with the out-of-range sentinel applied.
pub(crate) fn normalize_event(event: &mut CalendarEvent) -> Result<(), EventUseCaseError> {
    // Recurrence columns must parse before anything is derived from them
    if let Err(err) = event.recurrence_set() {
        return Err(EventUseCaseError::InvalidArgument(err.to_string()));
    }

    if event.dtend.is_some() && event.duration.is_some() {
        return Err(EventUseCaseError::InvalidArgument(
            "an event carries either dtend or duration, not both".into(),
        ));
    }
    if event.dtend.is_none() && event.duration.is_none() {
        return Err(EventUseCaseError::InvalidArgument(
            "an event requires dtend or duration".into(),
        ));
    }
    if event.is_recurring() {
        if let Some(dtend) = event.dtend.take() {
            let millis = (dtend - event.dtstart).num_milliseconds();
            if millis < 0 {
                return Err(EventUseCaseError::InvalidArgument(
                    "dtend before dtstart".into(),
                ));
            }
            event.duration = Some(EventDuration::from_millis(millis));
        }
    } else if let Some(duration) = event.duration.take() {
        event.dtend = Some(event.dtstart + chrono::TimeDelta::milliseconds(duration.millis()));
    }

    if event.original_sync_id.is_some() != event.original_instance_time.is_some() {
        return Err(EventUseCaseError::InvalidArgument(
            "a recurrence exception requires both original_sync_id and original_instance_time"
                .into(),
        ));
    }

    if event.all_day {
        event.event_timezone = chrono_tz::UTC;
        if !time::is_utc_midnight(event.dtstart) {
            warn!(event_id = %event.id, "Correcting all-day start to UTC midnight");
            event.dtstart = time::utc_midnight_floor(event.dtstart);
        }
        if let Some(dtend) = event.dtend {
            if !time::is_utc_midnight(dtend) {
                warn!(event_id = %event.id, "Correcting all-day end to UTC midnight");
                let floored = time::utc_midnight_floor(dtend);
                event.dtend = Some(if floored <= event.dtstart {
                    event.dtstart + chrono::TimeDelta::days(1)
                } else {
                    floored + chrono::TimeDelta::days(1)
                });
            }
        }
        if let Some(duration) = event.duration {
            if !duration.is_whole_days() {
                event.duration = Some(duration.ceil_to_days());
            }
        }
    }

    let start_ms = event.dtstart.timestamp_millis();
    if start_ms < 0 || start_ms / 1000 > i64::from(i32::MAX) {
        // Stored with the sentinel; the expander skips it
        warn!(event_id = %event.id, start_ms, "Event start outside representable range");
        event.dtstart = DateTime::from_timestamp_millis(-1)
            .unwrap_or(chrono::DateTime::<chrono::Utc>::UNIX_EPOCH);
        event.last_date = None;
        return Ok(());
    }

    event.last_date = event
        .compute_last_date()
        .map_err(|err| EventUseCaseError::InvalidArgument(err.to_string()))?;

    Ok(())
}
