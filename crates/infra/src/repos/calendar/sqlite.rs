use std::convert::{TryFrom, TryInto};

use almanac_domain::{Calendar, ID};
use sqlx::{FromRow, SqlitePool, types::Uuid};
use tracing::{error, instrument};

use super::ICalendarRepo;

#[derive(Debug)]
pub struct SqliteCalendarRepo {
    pool: SqlitePool,
}

impl SqliteCalendarRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct CalendarRaw {
    calendar_uid: Uuid,
    name: Option<String>,
    owner_account: Option<String>,
    timezone: String,
    selected: bool,
    sync_events: bool,
}

impl TryFrom<CalendarRaw> for Calendar {
    type Error = anyhow::Error;

    fn try_from(c: CalendarRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: c.calendar_uid.into(),
            name: c.name,
            owner_account: c.owner_account,
            timezone: c
                .timezone
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid calendar timezone: {}", c.timezone))?,
            selected: c.selected,
            sync_events: c.sync_events,
        })
    }
}

#[async_trait::async_trait]
impl ICalendarRepo for SqliteCalendarRepo {
    #[instrument(skip(self))]
    async fn insert(&self, calendar: &Calendar) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO calendars(calendar_uid, name, owner_account, timezone, selected, sync_events)
            VALUES(?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(calendar.id.as_ref())
        .bind(&calendar.name)
        .bind(&calendar.owner_account)
        .bind(calendar.timezone.name())
        .bind(calendar.selected)
        .bind(calendar.sync_events)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to insert calendar: {:?}. DB returned error: {:?}",
                calendar, err
            );
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn save(&self, calendar: &Calendar) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE calendars SET
                name = ?,
                owner_account = ?,
                timezone = ?,
                selected = ?,
                sync_events = ?
            WHERE calendar_uid = ?
            "#,
        )
        .bind(&calendar.name)
        .bind(&calendar.owner_account)
        .bind(calendar.timezone.name())
        .bind(calendar.selected)
        .bind(calendar.sync_events)
        .bind(calendar.id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to save calendar: {:?}. DB returned error: {:?}",
                calendar, err
            );
        })?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, calendar_id: &ID) -> anyhow::Result<Option<Calendar>> {
        sqlx::query_as::<_, CalendarRaw>(
            r#"
            SELECT * FROM calendars
            WHERE calendar_uid = ?
            "#,
        )
        .bind(calendar_id.as_ref())
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find calendar with id: {} failed. DB returned error: {:?}",
                calendar_id, err
            );
        })?
        .map(|c| c.try_into())
        .transpose()
    }

    #[instrument(skip(self))]
    async fn find_all(&self) -> anyhow::Result<Vec<Calendar>> {
        sqlx::query_as::<_, CalendarRaw>(
            r#"
            SELECT * FROM calendars
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!("Find all calendars failed. DB returned error: {:?}", err);
        })?
        .into_iter()
        .map(|c| c.try_into())
        .collect()
    }

    #[instrument(skip(self))]
    async fn delete(&self, calendar_id: &ID) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM calendars
            WHERE calendar_uid = ?
            "#,
        )
        .bind(calendar_id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Delete calendar with id: {} failed. DB returned error: {:?}",
                calendar_id, err
            );
        })?;
        Ok(())
    }
}
