use std::convert::{TryFrom, TryInto};

use almanac_domain::{Attendee, ID};
use sqlx::{FromRow, SqlitePool, types::Uuid};
use tracing::{error, instrument};

use super::IAttendeeRepo;

#[derive(Debug)]
pub struct SqliteAttendeeRepo {
    pool: SqlitePool,
}

impl SqliteAttendeeRepo {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, FromRow)]
struct AttendeeRaw {
    attendee_uid: Uuid,
    event_uid: Uuid,
    name: Option<String>,
    email: Option<String>,
    status: String,
}

impl TryFrom<AttendeeRaw> for Attendee {
    type Error = anyhow::Error;

    fn try_from(a: AttendeeRaw) -> anyhow::Result<Self> {
        Ok(Self {
            id: a.attendee_uid.into(),
            event_id: a.event_uid.into(),
            name: a.name,
            email: a.email,
            status: a.status.try_into()?,
        })
    }
}

#[async_trait::async_trait]
impl IAttendeeRepo for SqliteAttendeeRepo {
    #[instrument(skip(self))]
    async fn insert(&self, attendee: &Attendee) -> anyhow::Result<()> {
        let status: String = attendee.status.into();
        sqlx::query(
            r#"
            INSERT INTO attendees(attendee_uid, event_uid, name, email, status)
            VALUES(?, ?, ?, ?, ?)
            "#,
        )
        .bind(attendee.id.as_ref())
        .bind(attendee.event_id.as_ref())
        .bind(&attendee.name)
        .bind(&attendee.email)
        .bind(status)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to insert attendee: {:?}. DB returned error: {:?}",
                attendee, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn save(&self, attendee: &Attendee) -> anyhow::Result<()> {
        let status: String = attendee.status.into();
        sqlx::query(
            r#"
            UPDATE attendees SET name = ?, email = ?, status = ?
            WHERE attendee_uid = ?
            "#,
        )
        .bind(&attendee.name)
        .bind(&attendee.email)
        .bind(status)
        .bind(attendee.id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Unable to save attendee: {:?}. DB returned error: {:?}",
                attendee, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find(&self, attendee_id: &ID) -> anyhow::Result<Option<Attendee>> {
        sqlx::query_as::<_, AttendeeRaw>(
            r#"
            SELECT * FROM attendees
            WHERE attendee_uid = ?
            "#,
        )
        .bind(attendee_id.as_ref())
        .fetch_optional(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find attendee with id: {} failed. DB returned error: {:?}",
                attendee_id, err
            );
        })?
        .map(|a| a.try_into())
        .transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<Attendee>> {
        sqlx::query_as::<_, AttendeeRaw>(
            r#"
            SELECT * FROM attendees
            WHERE event_uid = ?
            "#,
        )
        .bind(event_id.as_ref())
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find attendees for event: {} failed. DB returned error: {:?}",
                event_id, err
            );
        })?
        .into_iter()
        .map(|a| a.try_into())
        .collect()
    }

    #[instrument(skip(self))]
    async fn delete(&self, attendee_id: &ID) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM attendees
            WHERE attendee_uid = ?
            "#,
        )
        .bind(attendee_id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Delete attendee with id: {} failed. DB returned error: {:?}",
                attendee_id, err
            );
        })?;
        Ok(())
    }
}
