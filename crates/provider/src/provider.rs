//! Typed entry points of the calendar provider. The URI facade in
//! [`crate::uri`] is a thin adapter over this surface; hosts embedding the
//! core call it directly.

use std::sync::Arc;

use almanac_domain::{
    AlertState,
    Attendee,
    AttendeeStatus,
    Calendar,
    CalendarAlert,
    CalendarEvent,
    EventStatus,
    ExtendedProperty,
    ID,
    Instance,
    Reminder,
    ReminderMethod,
};
use almanac_infra::{
    AlmanacContext,
    TIMEZONE_DATABASE_VERSION_KEY,
    TIMEZONE_INSTANCES_KEY,
    TIMEZONE_INSTANCES_PREVIOUS_KEY,
    TIMEZONE_TYPE_KEY,
    TimezoneType,
};
use tracing::info;

use crate::{
    alarm::{AlarmHost, AlarmScheduler},
    attendee::{CreateAttendeeUseCase, DeleteAttendeeUseCase, UpdateAttendeeUseCase},
    calendar::{
        CreateCalendarUseCase,
        DeleteCalendarUseCase,
        UpdateCalendarChanges,
        UpdateCalendarUseCase,
    },
    error::ProviderError,
    event::{
        CreateEventUseCase,
        DeleteEventUseCase,
        EventPayload,
        UpdateEventChanges,
        UpdateEventUseCase,
    },
    extended_property::{CreateExtendedPropertyUseCase, DeleteExtendedPropertyUseCase},
    instances::{InstancesCache, materialize_events, query_instances},
    reminder::{CreateReminderUseCase, DeleteReminderUseCase, UpdateReminderUseCase},
    shared::usecase::execute,
};

/// The calendar event provider core: event/calendar/reminder CRUD wired to
/// the instances cache and the alarm scheduler.
#[derive(Clone)]
pub struct CalendarProvider {
    ctx: AlmanacContext,
    cache: Arc<InstancesCache>,
    scheduler: AlarmScheduler,
    /// Low-storage latch: while the host reports the disk full, every write
    /// fails with `ResourceUnavailable` until the storage-ok signal.
    storage_available: Arc<std::sync::atomic::AtomicBool>,
}

impl CalendarProvider {
    pub fn new(ctx: AlmanacContext, host: Arc<dyn AlarmHost>) -> Self {
        let cache = Arc::new(InstancesCache::new(ctx.clone()));
        let scheduler = AlarmScheduler::new(ctx.clone(), cache.clone(), host);
        Self {
            ctx,
            cache,
            scheduler,
            storage_available: Arc::new(std::sync::atomic::AtomicBool::new(true)),
        }
    }

    /// Build with an explicit scheduler debounce, for tests.
    pub fn with_scheduler_delay(
        ctx: AlmanacContext,
        host: Arc<dyn AlarmHost>,
        delay: std::time::Duration,
    ) -> Self {
        let cache = Arc::new(InstancesCache::new(ctx.clone()));
        let scheduler = AlarmScheduler::with_delay(ctx.clone(), cache.clone(), host, delay);
        Self {
            ctx,
            cache,
            scheduler,
            storage_available: Arc::new(std::sync::atomic::AtomicBool::new(true)),
        }
    }

    fn ensure_storage(&self) -> Result<(), ProviderError> {
        if self
            .storage_available
            .load(std::sync::atomic::Ordering::SeqCst)
        {
            Ok(())
        } else {
            Err(ProviderError::ResourceUnavailable)
        }
    }

    /// A local (non sync-adapter) write to an event or its side tables
    /// flags the event for the next sync.
    async fn mark_event_dirty(&self, event_id: &ID) -> Result<(), ProviderError> {
        if let Some(mut event) = self.ctx.repos.events.find(event_id).await? {
            if !event.sync_dirty {
                event.sync_dirty = true;
                self.ctx.repos.events.save(&event).await?;
            }
        }
        Ok(())
    }

    pub fn context(&self) -> &AlmanacContext {
        &self.ctx
    }

    pub fn cache(&self) -> &InstancesCache {
        &self.cache
    }

    pub fn scheduler(&self) -> &AlarmScheduler {
        &self.scheduler
    }

    // ---- events ---------------------------------------------------------

    pub async fn create_event(
        &self,
        payload: EventPayload,
        caller_is_syncadapter: bool,
    ) -> Result<CalendarEvent, ProviderError> {
        self.ensure_storage()?;
        let event = execute(
            CreateEventUseCase {
                payload,
                caller_is_syncadapter,
            },
            &self.ctx,
        )
        .await?;
        self.after_event_mutation(None, &event).await?;
        Ok(event)
    }

    pub async fn update_event(
        &self,
        event_id: ID,
        changes: UpdateEventChanges,
        caller_is_syncadapter: bool,
    ) -> Result<CalendarEvent, ProviderError> {
        self.ensure_storage()?;
        let (old, event) = execute(
            UpdateEventUseCase {
                event_id,
                changes,
                caller_is_syncadapter,
            },
            &self.ctx,
        )
        .await?;
        self.after_event_mutation(Some(&old), &event).await?;
        Ok(event)
    }

    pub async fn delete_event(
        &self,
        event_id: ID,
        caller_is_syncadapter: bool,
    ) -> Result<(), ProviderError> {
        self.ensure_storage()?;
        let event = execute(
            DeleteEventUseCase {
                event_id,
                caller_is_syncadapter,
            },
            &self.ctx,
        )
        .await?;
        self.after_event_mutation(None, &event).await?;
        Ok(())
    }

    pub async fn get_event(&self, event_id: &ID) -> Result<Option<CalendarEvent>, ProviderError> {
        Ok(self.ctx.repos.events.find(event_id).await?)
    }

    pub async fn get_events(&self) -> Result<Vec<CalendarEvent>, ProviderError> {
        Ok(self.ctx.repos.events.find_all().await?)
    }

    pub async fn get_events_by_calendar(
        &self,
        calendar_id: &ID,
    ) -> Result<Vec<CalendarEvent>, ProviderError> {
        Ok(self.ctx.repos.events.find_by_calendar(calendar_id).await?)
    }

    /// Keep the instances cache consistent with an event write, then kick
    /// the alarm scheduler.
    ///
    /// Recurring events and exceptions that can touch the cached window
    /// invalidate it wholesale; a standalone event only swaps its own rows.
    async fn after_event_mutation(
        &self,
        before: Option<&CalendarEvent>,
        after: &CalendarEvent,
    ) -> Result<(), ProviderError> {
        let mut wipe = false;
        for event in before.iter().chain(std::iter::once(&after)) {
            if (event.is_recurring() || event.is_exception())
                && self.cache.event_affects_window(event).await?
            {
                wipe = true;
                break;
            }
        }

        if wipe {
            self.cache.invalidate().await?;
        } else {
            self.ctx.repos.instances.delete_for_event(&after.id).await?;
            let window = self.ctx.repos.properties.window().await?;
            if !window.is_empty() && !after.deleted && after.status != EventStatus::Cancelled {
                let rows = materialize_events(
                    std::slice::from_ref(after),
                    window.min_instance,
                    window.max_instance,
                    &window.local_timezone,
                );
                if !rows.is_empty() {
                    self.ctx.repos.instances.upsert(&rows).await?;
                }
            }
        }

        self.scheduler.schedule_next(false);
        Ok(())
    }

    // ---- calendars ------------------------------------------------------

    pub async fn create_calendar(
        &self,
        usecase: CreateCalendarUseCase,
    ) -> Result<Calendar, ProviderError> {
        self.ensure_storage()?;
        Ok(execute(usecase, &self.ctx).await?)
    }

    pub async fn update_calendar(
        &self,
        calendar_id: ID,
        changes: UpdateCalendarChanges,
    ) -> Result<Calendar, ProviderError> {
        self.ensure_storage()?;
        let calendar = execute(
            UpdateCalendarUseCase {
                calendar_id,
                changes,
            },
            &self.ctx,
        )
        .await?;
        // A (de)selected calendar changes which reminders may fire
        self.scheduler.schedule_next(false);
        Ok(calendar)
    }

    pub async fn delete_calendar(&self, calendar_id: ID) -> Result<(), ProviderError> {
        self.ensure_storage()?;
        execute(DeleteCalendarUseCase { calendar_id }, &self.ctx).await?;
        // The cascade removed events out from under the cache
        self.cache.invalidate().await?;
        self.scheduler.schedule_next(false);
        Ok(())
    }

    pub async fn get_calendar(
        &self,
        calendar_id: &ID,
    ) -> Result<Option<Calendar>, ProviderError> {
        Ok(self.ctx.repos.calendars.find(calendar_id).await?)
    }

    pub async fn get_calendars(&self) -> Result<Vec<Calendar>, ProviderError> {
        Ok(self.ctx.repos.calendars.find_all().await?)
    }

    // ---- reminders ------------------------------------------------------

    pub async fn create_reminder(
        &self,
        event_id: ID,
        minutes: i32,
        method: ReminderMethod,
        caller_is_syncadapter: bool,
    ) -> Result<Reminder, ProviderError> {
        self.ensure_storage()?;
        let reminder = execute(
            CreateReminderUseCase {
                event_id,
                minutes,
                method,
            },
            &self.ctx,
        )
        .await?;
        if !caller_is_syncadapter {
            self.mark_event_dirty(&reminder.event_id).await?;
        }
        self.scheduler.schedule_next(false);
        Ok(reminder)
    }

    pub async fn update_reminder(
        &self,
        reminder_id: ID,
        minutes: Option<i32>,
        method: Option<ReminderMethod>,
        caller_is_syncadapter: bool,
    ) -> Result<Reminder, ProviderError> {
        self.ensure_storage()?;
        let reminder = execute(
            UpdateReminderUseCase {
                reminder_id,
                minutes,
                method,
            },
            &self.ctx,
        )
        .await?;
        if !caller_is_syncadapter {
            self.mark_event_dirty(&reminder.event_id).await?;
        }
        self.scheduler.schedule_next(false);
        Ok(reminder)
    }

    pub async fn delete_reminder(
        &self,
        reminder_id: ID,
        caller_is_syncadapter: bool,
    ) -> Result<(), ProviderError> {
        self.ensure_storage()?;
        let reminder = execute(DeleteReminderUseCase { reminder_id }, &self.ctx).await?;
        if !caller_is_syncadapter {
            self.mark_event_dirty(&reminder.event_id).await?;
        }
        self.scheduler.schedule_next(false);
        Ok(())
    }

    pub async fn get_reminders_by_event(
        &self,
        event_id: &ID,
    ) -> Result<Vec<Reminder>, ProviderError> {
        Ok(self.ctx.repos.reminders.find_by_event(event_id).await?)
    }

    // ---- attendees ------------------------------------------------------

    pub async fn create_attendee(
        &self,
        event_id: ID,
        name: Option<String>,
        email: Option<String>,
        status: AttendeeStatus,
        caller_is_syncadapter: bool,
    ) -> Result<Attendee, ProviderError> {
        self.ensure_storage()?;
        let attendee = execute(
            CreateAttendeeUseCase {
                event_id,
                name,
                email,
                status,
            },
            &self.ctx,
        )
        .await?;
        if !caller_is_syncadapter {
            self.mark_event_dirty(&attendee.event_id).await?;
        }
        Ok(attendee)
    }

    pub async fn update_attendee(
        &self,
        attendee_id: ID,
        name: Option<Option<String>>,
        email: Option<Option<String>>,
        status: Option<AttendeeStatus>,
        caller_is_syncadapter: bool,
    ) -> Result<Attendee, ProviderError> {
        self.ensure_storage()?;
        let attendee = execute(
            UpdateAttendeeUseCase {
                attendee_id,
                name,
                email,
                status,
            },
            &self.ctx,
        )
        .await?;
        if !caller_is_syncadapter {
            self.mark_event_dirty(&attendee.event_id).await?;
        }
        Ok(attendee)
    }

    pub async fn delete_attendee(
        &self,
        attendee_id: ID,
        caller_is_syncadapter: bool,
    ) -> Result<(), ProviderError> {
        self.ensure_storage()?;
        let attendee = execute(DeleteAttendeeUseCase { attendee_id }, &self.ctx).await?;
        if !caller_is_syncadapter {
            self.mark_event_dirty(&attendee.event_id).await?;
        }
        Ok(())
    }

    pub async fn get_attendees_by_event(
        &self,
        event_id: &ID,
    ) -> Result<Vec<Attendee>, ProviderError> {
        Ok(self.ctx.repos.attendees.find_by_event(event_id).await?)
    }

    // ---- extended properties --------------------------------------------

    pub async fn create_extended_property(
        &self,
        event_id: ID,
        name: String,
        value: String,
        caller_is_syncadapter: bool,
    ) -> Result<ExtendedProperty, ProviderError> {
        self.ensure_storage()?;
        let property = execute(
            CreateExtendedPropertyUseCase {
                event_id,
                name,
                value,
            },
            &self.ctx,
        )
        .await?;
        if !caller_is_syncadapter {
            self.mark_event_dirty(&property.event_id).await?;
        }
        Ok(property)
    }

    pub async fn delete_extended_property(
        &self,
        property_id: ID,
        caller_is_syncadapter: bool,
    ) -> Result<(), ProviderError> {
        self.ensure_storage()?;
        let property = execute(DeleteExtendedPropertyUseCase { property_id }, &self.ctx).await?;
        if !caller_is_syncadapter {
            self.mark_event_dirty(&property.event_id).await?;
        }
        Ok(())
    }

    pub async fn get_extended_properties_by_event(
        &self,
        event_id: &ID,
    ) -> Result<Vec<ExtendedProperty>, ProviderError> {
        Ok(self
            .ctx
            .repos
            .extended_properties
            .find_by_event(event_id)
            .await?)
    }

    // ---- instances ------------------------------------------------------

    pub async fn query_instances(
        &self,
        begin_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<Instance>, ProviderError> {
        query_instances::instances_in_range(&self.ctx, &self.cache, begin_ms, end_ms).await
    }

    pub async fn query_instances_by_day(
        &self,
        start_day: i64,
        end_day: i64,
    ) -> Result<Vec<Instance>, ProviderError> {
        query_instances::instances_by_day(&self.ctx, &self.cache, start_day, end_day).await
    }

    pub async fn query_instances_grouped_by_day(
        &self,
        start_day: i64,
        end_day: i64,
    ) -> Result<Vec<(i64, Vec<Instance>)>, ProviderError> {
        query_instances::instances_grouped_by_day(&self.ctx, &self.cache, start_day, end_day)
            .await
    }

    // ---- alerts ---------------------------------------------------------

    pub async fn get_alerts(&self) -> Result<Vec<CalendarAlert>, ProviderError> {
        Ok(self.ctx.repos.alerts.find_all().await?)
    }

    pub async fn get_alert(&self, alert_id: &ID) -> Result<Option<CalendarAlert>, ProviderError> {
        Ok(self.ctx.repos.alerts.find(alert_id).await?)
    }

    pub async fn get_alerts_by_instance(
        &self,
        event_id: &ID,
        begin_ms: i64,
        end_ms: i64,
    ) -> Result<Vec<CalendarAlert>, ProviderError> {
        Ok(self
            .ctx
            .repos
            .alerts
            .find_by_instance(event_id, begin_ms, end_ms)
            .await?)
    }

    /// External dispatch reports an alarm as delivered.
    pub async fn mark_alert_fired(&self, alert_id: &ID) -> Result<(), ProviderError> {
        let now = self.ctx.sys.get_timestamp_millis();
        Ok(self
            .ctx
            .repos
            .alerts
            .set_state(alert_id, AlertState::Fired, now)
            .await?)
    }

    pub async fn dismiss_alert(&self, alert_id: &ID) -> Result<(), ProviderError> {
        let now = self.ctx.sys.get_timestamp_millis();
        Ok(self
            .ctx
            .repos
            .alerts
            .set_state(alert_id, AlertState::Dismissed, now)
            .await?)
    }

    // ---- alarm scheduling -----------------------------------------------

    pub fn schedule_next(&self, remove_old: bool) {
        self.scheduler.schedule_next(remove_old);
    }

    // ---- cache properties -----------------------------------------------

    pub async fn get_property(&self, key: &str) -> Result<Option<String>, ProviderError> {
        Ok(self.ctx.repos.properties.get(key).await?)
    }

    pub async fn get_properties(&self) -> Result<Vec<(String, Option<String>)>, ProviderError> {
        let mut out = Vec::new();
        for key in [
            TIMEZONE_TYPE_KEY,
            TIMEZONE_INSTANCES_KEY,
            TIMEZONE_INSTANCES_PREVIOUS_KEY,
            TIMEZONE_DATABASE_VERSION_KEY,
        ] {
            out.push((key.to_string(), self.ctx.repos.properties.get(key).await?));
        }
        Ok(out)
    }

    /// Write one of the instance-cache properties, applying the HOME/AUTO
    /// promotion rules. `timezoneInstancesPrevious` is read-only.
    pub async fn set_property(&self, key: &str, value: &str) -> Result<(), ProviderError> {
        let properties = &self.ctx.repos.properties;
        match key {
            TIMEZONE_TYPE_KEY => {
                let timezone_type = TimezoneType::try_from(value.to_string())
                    .map_err(|_| ProviderError::InvalidArgument(format!("timezoneType {}", value)))?;
                match timezone_type {
                    TimezoneType::Home => {
                        // Entering HOME mode pins the last known zone
                        let previous = properties
                            .get(TIMEZONE_INSTANCES_PREVIOUS_KEY)
                            .await?
                            .unwrap_or_else(|| self.ctx.sys.device_timezone().name().to_string());
                        properties.set(TIMEZONE_INSTANCES_KEY, &previous).await?;
                    }
                    TimezoneType::Auto => {
                        properties
                            .set(
                                TIMEZONE_INSTANCES_KEY,
                                self.ctx.sys.device_timezone().name(),
                            )
                            .await?;
                    }
                }
                properties.set(TIMEZONE_TYPE_KEY, value).await?;
                self.cache.invalidate().await?;
                self.scheduler.schedule_next(false);
                Ok(())
            }
            TIMEZONE_INSTANCES_KEY => {
                value.parse::<almanac_domain::Tz>().map_err(|_| {
                    ProviderError::InvalidArgument(format!("timezone {}", value))
                })?;
                let timezone_type = properties
                    .get(TIMEZONE_TYPE_KEY)
                    .await?
                    .map(TimezoneType::try_from)
                    .transpose()
                    .map_err(ProviderError::Transient)?
                    .unwrap_or(TimezoneType::Auto);
                if timezone_type == TimezoneType::Auto {
                    // The device zone rules in AUTO mode
                    info!("Ignoring timezoneInstances write while in auto mode");
                    return Ok(());
                }
                properties.set(TIMEZONE_INSTANCES_KEY, value).await?;
                properties.set(TIMEZONE_INSTANCES_PREVIOUS_KEY, value).await?;
                self.cache.invalidate().await?;
                self.scheduler.schedule_next(false);
                Ok(())
            }
            TIMEZONE_INSTANCES_PREVIOUS_KEY => Err(ProviderError::Unsupported(
                "timezoneInstancesPrevious is read-only".into(),
            )),
            TIMEZONE_DATABASE_VERSION_KEY => {
                let current = properties.get(TIMEZONE_DATABASE_VERSION_KEY).await?;
                if current.as_deref() != Some(value) {
                    properties.set(TIMEZONE_DATABASE_VERSION_KEY, value).await?;
                    self.cache.invalidate().await?;
                    self.scheduler.schedule_next(false);
                }
                Ok(())
            }
            other => Err(ProviderError::InvalidArgument(format!(
                "unknown cache property {}",
                other
            ))),
        }
    }

    // ---- environment signals --------------------------------------------

    /// The device zone changed. In AUTO mode the cache follows it.
    pub async fn on_timezone_changed(&self) -> Result<(), ProviderError> {
        let properties = &self.ctx.repos.properties;
        let timezone_type = properties
            .get(TIMEZONE_TYPE_KEY)
            .await?
            .map(TimezoneType::try_from)
            .transpose()
            .map_err(ProviderError::Transient)?
            .unwrap_or(TimezoneType::Auto);
        if timezone_type == TimezoneType::Auto {
            let stored = properties.get(TIMEZONE_INSTANCES_KEY).await?;
            let device = self.ctx.sys.device_timezone();
            if stored.as_deref() != Some(device.name()) {
                info!(zone = device.name(), "Device timezone changed, rebuilding instances");
                self.cache.invalidate().await?;
            }
        }
        self.scheduler.schedule_next(false);
        Ok(())
    }

    /// The host reports the disk full; reject writes until it recovers.
    pub fn on_storage_low(&self) {
        self.storage_available
            .store(false, std::sync::atomic::Ordering::SeqCst);
    }

    /// Storage came back after a disk-full period; everything derived is
    /// suspect.
    pub async fn on_storage_ok(&self) -> Result<(), ProviderError> {
        self.storage_available
            .store(true, std::sync::atomic::Ordering::SeqCst);
        self.cache.invalidate().await?;
        self.scheduler.schedule_next(false);
        Ok(())
    }

    /// The system clock jumped; recompute what should fire next.
    pub fn on_time_changed(&self) {
        self.scheduler.schedule_next(false);
    }
}
