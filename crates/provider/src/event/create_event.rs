use almanac_domain::{
    AttendeeStatus,
    CalendarEvent,
    EventDuration,
    EventStatus,
    ExtendedProperty,
    ID,
    ORIGINAL_TIMEZONE_PROPERTY,
    Tz,
};
use almanac_infra::AlmanacContext;
use chrono::{DateTime, Utc};
use tracing::error;

use super::{EventUseCaseError, normalize_event};
use crate::shared::usecase::UseCase;

/// Column values for an event insert; also reused by the update path as
/// the base it patches.
#[derive(Debug, Clone)]
pub struct EventPayload {
    pub calendar_id: ID,
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub status: EventStatus,
    pub dtstart: DateTime<Utc>,
    pub dtend: Option<DateTime<Utc>>,
    pub duration: Option<EventDuration>,
    pub event_timezone: Option<Tz>,
    pub all_day: bool,
    pub rrule: Option<String>,
    pub rdate: Option<String>,
    pub exrule: Option<String>,
    pub exdate: Option<String>,
    pub sync_id: Option<String>,
    pub original_sync_id: Option<String>,
    pub original_instance_time: Option<DateTime<Utc>>,
    pub original_all_day: bool,
}

impl Default for EventPayload {
    fn default() -> Self {
        Self {
            calendar_id: Default::default(),
            title: None,
            description: None,
            location: None,
            status: Default::default(),
            dtstart: DateTime::<Utc>::UNIX_EPOCH,
            dtend: None,
            duration: None,
            event_timezone: None,
            all_day: false,
            rrule: None,
            rdate: None,
            exrule: None,
            exdate: None,
            sync_id: None,
            original_sync_id: None,
            original_instance_time: None,
            original_all_day: false,
        }
    }
}

#[derive(Debug)]
pub struct CreateEventUseCase {
    pub payload: EventPayload,
    pub caller_is_syncadapter: bool,
}

#[async_trait::async_trait]
impl UseCase for CreateEventUseCase {
    type Response = CalendarEvent;
    type Error = EventUseCaseError;

    const NAME: &'static str = "CreateEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let payload = self.payload.clone();

        ctx.repos
            .calendars
            .find(&payload.calendar_id)
            .await
            .map_err(|_| EventUseCaseError::StorageError)?
            .ok_or(EventUseCaseError::CalendarNotFound)?;

        let specified_zone = payload.event_timezone;
        let mut event = CalendarEvent {
            calendar_id: payload.calendar_id,
            title: payload.title,
            description: payload.description,
            location: payload.location,
            status: payload.status,
            dtstart: payload.dtstart,
            dtend: payload.dtend,
            duration: payload.duration,
            event_timezone: payload.event_timezone.unwrap_or(chrono_tz::UTC),
            all_day: payload.all_day,
            rrule: payload.rrule,
            rdate: payload.rdate,
            exrule: payload.exrule,
            exdate: payload.exdate,
            sync_id: payload.sync_id,
            original_sync_id: payload.original_sync_id,
            original_instance_time: payload.original_instance_time,
            original_all_day: payload.original_all_day,
            sync_dirty: !self.caller_is_syncadapter,
            self_attendee_status: AttendeeStatus::None,
            ..Default::default()
        };

        normalize_event(&mut event)?;

        ctx.repos.events.insert(&event).await.map_err(|e| {
            error!(event_id = %event.id, error = ?e, "Unable to insert event");
            EventUseCaseError::StorageError
        })?;

        // Remember the zone the event was first written with
        if let Some(zone) = specified_zone {
            let property = ExtendedProperty::new(
                event.id.clone(),
                ORIGINAL_TIMEZONE_PROPERTY,
                zone.name(),
            );
            if let Err(e) = ctx.repos.extended_properties.insert(&property).await {
                error!(event_id = %event.id, error = ?e, "Unable to record original timezone");
            }
        }

        Ok(event)
    }
}
