use almanac_domain::{CalendarEvent, EventDuration, EventStatus, ID, Tz};
use almanac_infra::AlmanacContext;
use chrono::{DateTime, Utc};
use tracing::error;

use super::{EventUseCaseError, normalize_event};
use crate::shared::usecase::UseCase;

/// Field changes for an event update. The outer `Option` is "touch this
/// column at all"; the inner one clears nullable columns.
#[derive(Debug, Clone, Default)]
pub struct UpdateEventChanges {
    pub title: Option<Option<String>>,
    pub description: Option<Option<String>>,
    pub location: Option<Option<String>>,
    pub status: Option<EventStatus>,
    pub dtstart: Option<DateTime<Utc>>,
    pub dtend: Option<Option<DateTime<Utc>>>,
    pub duration: Option<Option<EventDuration>>,
    pub event_timezone: Option<Tz>,
    pub all_day: Option<bool>,
    pub rrule: Option<Option<String>>,
    pub rdate: Option<Option<String>>,
    pub exrule: Option<Option<String>>,
    pub exdate: Option<Option<String>>,
}

#[derive(Debug)]
pub struct UpdateEventUseCase {
    pub event_id: ID,
    pub changes: UpdateEventChanges,
    pub caller_is_syncadapter: bool,
}

#[async_trait::async_trait]
impl UseCase for UpdateEventUseCase {
    /// The pre-image and the saved event; the caller needs both to decide
    /// whether the instances cache is affected.
    type Response = (CalendarEvent, CalendarEvent);
    type Error = EventUseCaseError;

    const NAME: &'static str = "UpdateEvent";

    async fn execute(&mut self, ctx: &AlmanacContext) -> Result<Self::Response, Self::Error> {
        let old = ctx
            .repos
            .events
            .find(&self.event_id)
            .await
            .map_err(|_| EventUseCaseError::StorageError)?
            .ok_or(EventUseCaseError::EventNotFound)?;

        let mut event = old.clone();
        let changes = self.changes.clone();
        if let Some(title) = changes.title {
            event.title = title;
        }
        if let Some(description) = changes.description {
            event.description = description;
        }
        if let Some(location) = changes.location {
            event.location = location;
        }
        if let Some(status) = changes.status {
            event.status = status;
        }
        if let Some(dtstart) = changes.dtstart {
            event.dtstart = dtstart;
        }
        if let Some(dtend) = changes.dtend {
            event.dtend = dtend;
        }
        if let Some(duration) = changes.duration {
            event.duration = duration;
        }
        if let Some(timezone) = changes.event_timezone {
            event.event_timezone = timezone;
        }
        if let Some(all_day) = changes.all_day {
            event.all_day = all_day;
        }
        if let Some(rrule) = changes.rrule {
            event.rrule = rrule;
        }
        if let Some(rdate) = changes.rdate {
            event.rdate = rdate;
        }
        if let Some(exrule) = changes.exrule {
            event.exrule = exrule;
        }
        if let Some(exdate) = changes.exdate {
            event.exdate = exdate;
        }

        event.sync_dirty = old.sync_dirty || !self.caller_is_syncadapter;
        // normalize_event flips dtend/duration when a recurrence was added
        // or removed, and recomputes last_date
        normalize_event(&mut event)?;

        ctx.repos.events.save(&event).await.map_err(|e| {
            error!(event_id = %event.id, error = ?e, "Unable to save event");
            EventUseCaseError::StorageError
        })?;

        Ok((old, event))
    }
}
