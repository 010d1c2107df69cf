use std::convert::{TryFrom, TryInto};

use almanac_domain::{ID, Reminder};
use sqlx::{FromRow, SqlitePool, types::Uuid};
use tracing::{error, instrument};

use super::IReminderRepo;

#[derive(Debug)]
pub struct SqliteReminderRepo {
    pool: SqlitePool,
}

impl SqliteReminderRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct ReminderRaw {
    reminder_uid: Uuid,
    event_uid: Uuid,
    minutes: i32,
    method: String,
}

impl TryFrom<ReminderRaw> for Reminder {
    type Error = anyhow::Error;

    fn try_from(r: ReminderRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: r.reminder_uid.into(),
            event_id: r.event_uid.into(),
            minutes: r.minutes,
            method: r.method.try_into()?,
        })
    }
}

#[async_trait::async_trait]
impl IReminderRepo for SqliteReminderRepo {
    #[instrument(skip(self))]
    async fn insert(&self, reminder: &Reminder) -> anyhow::Result<()> {
        let method: String = reminder.method.into();
        sqlx::query(
            r#"
            INSERT INTO reminders(reminder_uid, event_uid, minutes, method)
            VALUES(?, ?, ?, ?)
            "#,
        )
        .bind(reminder.id.as_ref())
        .bind(reminder.event_id.as_ref())
        .bind(reminder.minutes)
        .bind(method)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to insert reminder: {:?}. DB returned error: {:?}",
                reminder, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn save(&self, reminder: &Reminder) -> anyhow::Result<()> {
        let method: String = reminder.method.into();
        sqlx::query(
            r#"
            UPDATE reminders SET minutes = ?, method = ?
            WHERE reminder_uid = ?
            "#,
        )
        .bind(reminder.minutes)
        .bind(method)
        .bind(reminder.id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to save reminder: {:?}. DB returned error: {:?}",
                reminder, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, reminder_id: &ID) -> anyhow::Result<Option<Reminder>> {
        sqlx::query_as::<_, ReminderRaw>(
            r#"
            SELECT * FROM reminders
            WHERE reminder_uid = ?
            "#,
        )
        .bind(reminder_id.as_ref())
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find reminder with id: {} failed. DB returned error: {:?}",
                reminder_id, err
            );
        })?
        .map(|r| r.try_into())
        .transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<Reminder>> {
        sqlx::query_as::<_, ReminderRaw>(
            r#"
            SELECT * FROM reminders
            WHERE event_uid = ?
            ORDER BY minutes
            "#,
        )
        .bind(event_id.as_ref())
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find reminders for event: {} failed. DB returned error: {:?}",
                event_id, err
            );
        })?
        .into_iter()
        .map(|r| r.try_into())
        .collect()
    }

    #[instrument(skip(self))]
    async fn delete(&self, reminder_id: &ID) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM reminders
            WHERE reminder_uid = ?
            "#,
        )
        .bind(reminder_id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Delete reminder with id: {} failed. DB returned error: {:?}",
                reminder_id, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_by_event(&self, event_id: &ID) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM reminders
            WHERE event_uid = ?
            "#,
        )
        .bind(event_id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Delete reminders for event: {} failed. DB returned error: {:?}",
                event_id, err
            );
        })?;
        Ok(())
    }
}
