use std::convert::{TryFrom, TryInto};

use almanac_domain::{AlertState, CalendarAlert, ID};
use sqlx::{FromRow, SqlitePool, types::Uuid};
use tracing::{error, instrument};

use super::{DueReminder, IAlertRepo};
use crate::repos::shared::datetime_from_millis;

#[derive(Debug)]
pub struct SqliteAlertRepo {
    pool: SqlitePool,
}

impl SqliteAlertRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AlertRaw {
    alert_uid: Uuid,
    event_uid: Uuid,
    begin_time: i64,
    end_time: i64,
    alarm_time: i64,
    minutes: i32,
    state: String,
    creation_time: i64,
    received_time: Option<i64>,
    notify_time: Option<i64>,
}

impl TryFrom<AlertRaw> for CalendarAlert {
    type Error = anyhow::Error;

    fn try_from(a: AlertRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: a.alert_uid.into(),
            event_id: a.event_uid.into(),
            begin: datetime_from_millis(a.begin_time)?,
            end: datetime_from_millis(a.end_time)?,
            alarm_time: datetime_from_millis(a.alarm_time)?,
            minutes: a.minutes,
            state: a.state.try_into()?,
            creation_time: datetime_from_millis(a.creation_time)?,
            received_time: a.received_time.map(datetime_from_millis).transpose()?,
            notify_time: a.notify_time.map(datetime_from_millis).transpose()?,
        })
    }
}

#[derive(Debug, FromRow)]
struct DueReminderRaw {
    event_uid: Uuid,
    begin_time: i64,
    end_time: i64,
    alarm_time: i64,
    minutes: i32,
    title: Option<String>,
}

impl TryFrom<DueReminderRaw> for DueReminder {
    type Error = anyhow::Error;

    fn try_from(d: DueReminderRaw) -> anyhow::Result<Self> {
        Ok(Self {
            event_id: d.event_uid.into(),
            begin: datetime_from_millis(d.begin_time)?,
            end: datetime_from_millis(d.end_time)?,
            alarm_time: datetime_from_millis(d.alarm_time)?,
            minutes: d.minutes,
            title: d.title,
        })
    }
}

#[async_trait::async_trait]
impl IAlertRepo for SqliteAlertRepo {
    #[instrument(skip(self, alert), fields(event_id = %alert.event_id))]
    async fn insert(&self, alert: &CalendarAlert) -> anyhow::Result<()> {
        let state: String = alert.state.into();
        sqlx::query(
            r#"
            INSERT INTO calendar_alerts(
                alert_uid, event_uid, begin_time, end_time, alarm_time,
                minutes, state, creation_time, received_time, notify_time
            )
            VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(alarm_time, begin_time, event_uid) DO NOTHING
            "#,
        )
        .bind(alert.id.as_ref())
        .bind(alert.event_id.as_ref())
        .bind(alert.begin.timestamp_millis())
        .bind(alert.end.timestamp_millis())
        .bind(alert.alarm_time.timestamp_millis())
        .bind(alert.minutes)
        .bind(state)
        .bind(alert.creation_time.timestamp_millis())
        .bind(alert.received_time.map(|t| t.timestamp_millis()))
        .bind(alert.notify_time.map(|t| t.timestamp_millis()))
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to insert alert: {:?}. DB returned error: {:?}",
                alert, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, alert_id: &ID) -> anyhow::Result<Option<CalendarAlert>> {
        sqlx::query_as::<_, AlertRaw>(
            r#"
            SELECT * FROM calendar_alerts
            WHERE alert_uid = ?
            "#,
        )
        .bind(alert_id.as_ref())
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find alert with id: {} failed. DB returned error: {:?}",
                alert_id, err
            );
        })?
        .map(|a| a.try_into())
        .transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_instance(
        &self,
        event_id: &ID,
        begin: i64,
        end: i64,
    ) -> anyhow::Result<Vec<CalendarAlert>> {
        sqlx::query_as::<_, AlertRaw>(
            r#"
            SELECT * FROM calendar_alerts
            WHERE event_uid = ? AND begin_time = ? AND end_time = ?
            ORDER BY alarm_time
            "#,
        )
        .bind(event_id.as_ref())
        .bind(begin)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find alerts for instance of event: {} failed. DB returned error: {:?}",
                event_id, err
            );
        })?
        .into_iter()
        .map(|a| a.try_into())
        .collect()
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> anyhow::Result<Vec<CalendarAlert>> {
        sqlx::query_as::<_, AlertRaw>(
            r#"
            SELECT * FROM calendar_alerts
            ORDER BY alarm_time
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!("Find all alerts failed. DB returned error: {:?}", err);
        })?
        .into_iter()
        .map(|a| a.try_into())
        .collect()
    }

    #[instrument(skip(self))]
    async fn set_state(
        &self,
        alert_id: &ID,
        state: AlertState,
        now_ms: i64,
    ) -> anyhow::Result<()> {
        let state_str: String = state.into();
        let query = match state {
            AlertState::Fired => {
                r#"
                UPDATE calendar_alerts SET state = ?, received_time = ?
                WHERE alert_uid = ?
                "#
            }
            _ => {
                r#"
                UPDATE calendar_alerts SET state = ?, notify_time = ?
                WHERE alert_uid = ?
                "#
            }
        };
        sqlx::query(query)
            .bind(state_str)
            .bind(now_ms)
            .bind(alert_id.as_ref())
            .execute(&self.pool)
            .await
            .inspect_err(|err| {
                error!(
                    "Set alert {} state failed. DB returned error: {:?}",
                    alert_id, err
                );
            })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, alert_id: &ID) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM calendar_alerts
            WHERE alert_uid = ?
            "#,
        )
        .bind(alert_id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Delete alert with id: {} failed. DB returned error: {:?}",
                alert_id, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_scheduled(&self) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM calendar_alerts
            WHERE state = 'scheduled'
            "#,
        )
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!("Delete scheduled alerts failed. DB returned error: {:?}", err);
        })?;
        Ok(res.rows_affected())
    }

    #[instrument(skip(self))]
    async fn purge_stale(&self, now_ms: i64, old_threshold_ms: i64) -> anyhow::Result<u64> {
        let res = sqlx::query(
            r#"
            DELETE FROM calendar_alerts
            WHERE
                NOT EXISTS (
                    SELECT 1 FROM instances i
                    WHERE i.event_uid = calendar_alerts.event_uid
                    AND i.begin_time = calendar_alerts.begin_time
                    AND i.end_time = calendar_alerts.end_time
                )
                OR (
                    minutes <> 0
                    AND NOT EXISTS (
                        SELECT 1 FROM reminders r
                        WHERE r.event_uid = calendar_alerts.event_uid
                        AND r.minutes = calendar_alerts.minutes
                    )
                )
                OR alarm_time < ?
            "#,
        )
        .bind(now_ms - old_threshold_ms)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!("Purge stale alerts failed. DB returned error: {:?}", err);
        })?;
        Ok(res.rows_affected())
    }

    #[instrument(skip(self))]
    async fn find_due_reminders(
        &self,
        start_ms: i64,
        horizon_ms: i64,
        now_ms: i64,
    ) -> anyhow::Result<Vec<DueReminder>> {
        sqlx::query_as::<_, DueReminderRaw>(
            r#"
            SELECT
                i.event_uid,
                i.begin_time,
                i.end_time,
                (i.begin_time - r.minutes * 60000) AS alarm_time,
                r.minutes,
                e.title
            FROM instances i
            INNER JOIN reminders r ON r.event_uid = i.event_uid
            INNER JOIN events e ON e.event_uid = i.event_uid
            INNER JOIN calendars c ON c.calendar_uid = e.calendar_uid
            WHERE r.method = 'alert'
            AND c.selected = 1
            AND (i.begin_time - r.minutes * 60000) >= ?
            AND (i.begin_time - r.minutes * 60000) <= ?
            AND i.end_time >= ?
            AND NOT EXISTS (
                SELECT 1 FROM calendar_alerts ca
                WHERE ca.event_uid = i.event_uid
                AND ca.begin_time = i.begin_time
                AND ca.alarm_time = (i.begin_time - r.minutes * 60000)
            )
            ORDER BY alarm_time, i.begin_time, e.title
            "#,
        )
        .bind(start_ms)
        .bind(horizon_ms)
        .bind(now_ms)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find due reminders in [{}, {}] failed. DB returned error: {:?}",
                start_ms, horizon_ms, err
            );
        })?
        .into_iter()
        .map(|d| d.try_into())
        .collect()
    }
}
