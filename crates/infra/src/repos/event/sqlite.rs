use std::convert::{TryFrom, TryInto};

use almanac_domain::{CalendarEvent, ID};
use sqlx::{FromRow, SqlitePool, types::Uuid};
use tracing::{error, instrument};

use super::IEventRepo;
use crate::repos::shared::datetime_from_millis;

#[derive(Debug)]
pub struct SqliteEventRepo {
    pool: SqlitePool,
}

impl SqliteEventRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct EventRaw {
    event_uid: Uuid,
    calendar_uid: Uuid,
    title: Option<String>,
    description: Option<String>,
    location: Option<String>,
    status: String,
    dtstart: i64,
    dtend: Option<i64>,
    duration: Option<String>,
    event_timezone: String,
    all_day: bool,
    rrule: Option<String>,
    rdate: Option<String>,
    exrule: Option<String>,
    exdate: Option<String>,
    sync_id: Option<String>,
    original_sync_id: Option<String>,
    original_instance_time: Option<i64>,
    original_all_day: bool,
    last_date: Option<i64>,
    deleted: bool,
    sync_dirty: bool,
    self_attendee_status: String,
}

impl TryFrom<EventRaw> for CalendarEvent {
    type Error = anyhow::Error;

    fn try_from(e: EventRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: e.event_uid.into(),
            calendar_id: e.calendar_uid.into(),
            title: e.title,
            description: e.description,
            location: e.location,
            status: e.status.try_into()?,
            dtstart: datetime_from_millis(e.dtstart)?,
            dtend: e.dtend.map(datetime_from_millis).transpose()?,
            duration: e
                .duration
                .map(|d| {
                    d.parse()
                        .map_err(|err| anyhow::anyhow!("Invalid stored duration: {:?}", err))
                })
                .transpose()?,
            event_timezone: e
                .event_timezone
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid event timezone: {}", e.event_timezone))?,
            all_day: e.all_day,
            rrule: e.rrule,
            rdate: e.rdate,
            exrule: e.exrule,
            exdate: e.exdate,
            sync_id: e.sync_id,
            original_sync_id: e.original_sync_id,
            original_instance_time: e
                .original_instance_time
                .map(datetime_from_millis)
                .transpose()?,
            original_all_day: e.original_all_day,
            last_date: e.last_date.map(datetime_from_millis).transpose()?,
            deleted: e.deleted,
            sync_dirty: e.sync_dirty,
            self_attendee_status: e.self_attendee_status.try_into()?,
        })
    }
}

#[async_trait::async_trait]
impl IEventRepo for SqliteEventRepo {
    #[instrument(skip(self, e), fields(event_id = %e.id))]
    async fn insert(&self, e: &CalendarEvent) -> anyhow::Result<()> {
        let status: String = e.status.into();
        let self_attendee_status: String = e.self_attendee_status.into();
        sqlx::query(
            r#"
            INSERT INTO events(
                event_uid,
                calendar_uid,
                title,
                description,
                location,
                status,
                dtstart,
                dtend,
                duration,
                event_timezone,
                all_day,
                rrule,
                rdate,
                exrule,
                exdate,
                sync_id,
                original_sync_id,
                original_instance_time,
                original_all_day,
                last_date,
                deleted,
                sync_dirty,
                self_attendee_status
            )
            VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(e.id.as_ref())
        .bind(e.calendar_id.as_ref())
        .bind(&e.title)
        .bind(&e.description)
        .bind(&e.location)
        .bind(status)
        .bind(e.dtstart.timestamp_millis())
        .bind(e.dtend.map(|d| d.timestamp_millis()))
        .bind(e.duration.map(|d| d.to_string()))
        .bind(e.event_timezone.name())
        .bind(e.all_day)
        .bind(&e.rrule)
        .bind(&e.rdate)
        .bind(&e.exrule)
        .bind(&e.exdate)
        .bind(&e.sync_id)
        .bind(&e.original_sync_id)
        .bind(e.original_instance_time.map(|d| d.timestamp_millis()))
        .bind(e.original_all_day)
        .bind(e.last_date.map(|d| d.timestamp_millis()))
        .bind(e.deleted)
        .bind(e.sync_dirty)
        .bind(self_attendee_status)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to insert event: {:?}. DB returned error: {:?}",
                e, err
            );
        })?;

        Ok(())
    }

    #[instrument(skip(self, e), fields(event_id = %e.id))]
    async fn save(&self, e: &CalendarEvent) -> anyhow::Result<()> {
        let status: String = e.status.into();
        let self_attendee_status: String = e.self_attendee_status.into();
        sqlx::query(
            r#"
            UPDATE events SET
                title = ?,
                description = ?,
                location = ?,
                status = ?,
                dtstart = ?,
                dtend = ?,
                duration = ?,
                event_timezone = ?,
                all_day = ?,
                rrule = ?,
                rdate = ?,
                exrule = ?,
                exdate = ?,
                sync_id = ?,
                original_sync_id = ?,
                original_instance_time = ?,
                original_all_day = ?,
                last_date = ?,
                deleted = ?,
                sync_dirty = ?,
                self_attendee_status = ?
            WHERE event_uid = ?
            "#,
        )
        .bind(&e.title)
        .bind(&e.description)
        .bind(&e.location)
        .bind(status)
        .bind(e.dtstart.timestamp_millis())
        .bind(e.dtend.map(|d| d.timestamp_millis()))
        .bind(e.duration.map(|d| d.to_string()))
        .bind(e.event_timezone.name())
        .bind(e.all_day)
        .bind(&e.rrule)
        .bind(&e.rdate)
        .bind(&e.exrule)
        .bind(&e.exdate)
        .bind(&e.sync_id)
        .bind(&e.original_sync_id)
        .bind(e.original_instance_time.map(|d| d.timestamp_millis()))
        .bind(e.original_all_day)
        .bind(e.last_date.map(|d| d.timestamp_millis()))
        .bind(e.deleted)
        .bind(e.sync_dirty)
        .bind(self_attendee_status)
        .bind(e.id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to save event: {:?}. DB returned error: {:?}",
                e, err
            );
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, event_id: &ID) -> anyhow::Result<Option<CalendarEvent>> {
        sqlx::query_as::<_, EventRaw>(
            r#"
            SELECT * FROM events
            WHERE event_uid = ?
            "#,
        )
        .bind(event_id.as_ref())
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find event with id: {} failed. DB returned error: {:?}",
                event_id, err
            );
        })?
        .map(|e| e.try_into())
        .transpose()
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> anyhow::Result<Vec<CalendarEvent>> {
        sqlx::query_as::<_, EventRaw>(
            r#"
            SELECT * FROM events
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!("Find all events failed. DB returned error: {:?}", err);
        })?
        .into_iter()
        .map(|e| e.try_into())
        .collect()
    }

    #[instrument(skip(self))]
    async fn find_by_calendar(&self, calendar_id: &ID) -> anyhow::Result<Vec<CalendarEvent>> {
        sqlx::query_as::<_, EventRaw>(
            r#"
            SELECT * FROM events
            WHERE calendar_uid = ?
            "#,
        )
        .bind(calendar_id.as_ref())
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find events for calendar id: {} failed. DB returned error: {:?}",
                calendar_id, err
            );
        })?
        .into_iter()
        .map(|e| e.try_into())
        .collect()
    }

    #[instrument(skip(self))]
    async fn find_for_window(
        &self,
        window_start: i64,
        window_end: i64,
        exception_slack_ms: i64,
    ) -> anyhow::Result<Vec<CalendarEvent>> {
        sqlx::query_as::<_, EventRaw>(
            r#"
            SELECT * FROM events
            WHERE deleted = 0
            AND (
                (dtstart <= ? AND (last_date IS NULL OR last_date >= ?))
                OR (
                    original_instance_time IS NOT NULL
                    AND original_instance_time >= ?
                    AND original_instance_time <= ?
                )
            )
            "#,
        )
        .bind(window_end)
        .bind(window_start)
        .bind(window_start - exception_slack_ms)
        .bind(window_end)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find events for window [{}, {}] failed. DB returned error: {:?}",
                window_start, window_end, err
            );
        })?
        .into_iter()
        .map(|e| e.try_into())
        .collect()
    }

    #[instrument(skip(self))]
    async fn delete(&self, event_id: &ID) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM events
            WHERE event_uid = ?
            "#,
        )
        .bind(event_id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Delete event with id: {} failed. DB returned error: {:?}",
                event_id, err
            );
        })?;
        Ok(())
    }
}
