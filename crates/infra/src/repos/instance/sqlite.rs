use std::{convert::TryFrom, sync::Arc};

use almanac_domain::{ID, Instance};
use sqlx::{FromRow, Sqlite, SqlitePool, Transaction, types::Uuid};
use tracing::{error, instrument};

use super::IInstanceRepo;
use crate::repos::{
    properties::InstancesWindow,
    shared::{datetime_from_millis, state_cache::StateCache},
};

pub struct SqliteInstanceRepo {
    pool: SqlitePool,
    state_cache: Arc<StateCache>,
}

impl SqliteInstanceRepo {
    pub fn new(pool: SqlitePool, state_cache: Arc<StateCache>) -> Self {
        Self { pool, state_cache }
    }

    async fn insert_all(
        tx: &mut Transaction<'_, Sqlite>,
        instances: &[Instance],
    ) -> sqlx::Result<()> {
        for instance in instances {
            sqlx::query(
                r#"
                INSERT INTO instances(
                    event_uid, begin_time, end_time,
                    start_day, end_day, start_minute, end_minute
                )
                VALUES(?, ?, ?, ?, ?, ?, ?)
                ON CONFLICT(event_uid, begin_time, end_time) DO UPDATE SET
                    start_day = excluded.start_day,
                    end_day = excluded.end_day,
                    start_minute = excluded.start_minute,
                    end_minute = excluded.end_minute
                "#,
            )
            .bind(instance.event_id.as_ref())
            .bind(instance.begin.timestamp_millis())
            .bind(instance.end.timestamp_millis())
            .bind(instance.start_day)
            .bind(instance.end_day)
            .bind(instance.start_minute)
            .bind(instance.end_minute)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }

    async fn write_window(
        tx: &mut Transaction<'_, Sqlite>,
        window: &InstancesWindow,
    ) -> sqlx::Result<()> {
        sqlx::query(
            r#"
            UPDATE calendar_metadata SET
                local_timezone = ?,
                min_instance = ?,
                max_instance = ?
            WHERE id = 0
            "#,
        )
        .bind(window.local_timezone.name())
        .bind(window.min_instance)
        .bind(window.max_instance)
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[derive(Debug, FromRow)]
struct InstanceRaw {
    event_uid: Uuid,
    begin_time: i64,
    end_time: i64,
    start_day: i64,
    end_day: i64,
    start_minute: i32,
    end_minute: i32,
}

impl TryFrom<InstanceRaw> for Instance {
    type Error = anyhow::Error;

    fn try_from(i: InstanceRaw) -> anyhow::Result<Self> {
        Ok(Self {
            event_id: i.event_uid.into(),
            begin: datetime_from_millis(i.begin_time)?,
            end: datetime_from_millis(i.end_time)?,
            start_day: i.start_day,
            end_day: i.end_day,
            start_minute: i.start_minute,
            end_minute: i.end_minute,
        })
    }
}

#[async_trait::async_trait]
impl IInstanceRepo for SqliteInstanceRepo {
    #[instrument(skip(self, instances), fields(count = instances.len()))]
    async fn replace_window(
        &self,
        instances: &[Instance],
        window: &InstancesWindow,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM instances")
            .execute(&mut *tx)
            .await?;
        Self::insert_all(&mut tx, instances).await?;
        Self::write_window(&mut tx, window).await?;
        tx.commit().await.inspect_err(|err| {
            error!("Unable to replace instances window. DB returned error: {:?}", err);
        })?;
        self.state_cache.invalidate_window().await;
        Ok(())
    }

    #[instrument(skip(self, instances), fields(count = instances.len()))]
    async fn extend_window(
        &self,
        instances: &[Instance],
        window: &InstancesWindow,
    ) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_all(&mut tx, instances).await?;
        Self::write_window(&mut tx, window).await?;
        tx.commit().await.inspect_err(|err| {
            error!("Unable to extend instances window. DB returned error: {:?}", err);
        })?;
        self.state_cache.invalidate_window().await;
        Ok(())
    }

    #[instrument(skip(self, instances), fields(count = instances.len()))]
    async fn upsert(&self, instances: &[Instance]) -> anyhow::Result<()> {
        let mut tx = self.pool.begin().await?;
        Self::insert_all(&mut tx, instances).await?;
        tx.commit().await.inspect_err(|err| {
            error!("Unable to upsert instances. DB returned error: {:?}", err);
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete_for_event(&self, event_id: &ID) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            DELETE FROM instances
            WHERE event_uid = ?
            "#,
        )
        .bind(event_id.as_ref())
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Delete instances for event: {} failed. DB returned error: {:?}",
                event_id, err
            );
        })?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn find_in_range(&self, begin: i64, end: i64) -> anyhow::Result<Vec<Instance>> {
        sqlx::query_as::<_, InstanceRaw>(
            r#"
            SELECT * FROM instances
            WHERE begin_time <= ? AND end_time >= ?
            ORDER BY begin_time, end_time
            "#,
        )
        .bind(end)
        .bind(begin)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find instances in range [{}, {}] failed. DB returned error: {:?}",
                begin, end, err
            );
        })?
        .into_iter()
        .map(Instance::try_from)
        .collect()
    }

    #[instrument(skip(self))]
    async fn find_by_days(&self, start_day: i64, end_day: i64) -> anyhow::Result<Vec<Instance>> {
        sqlx::query_as::<_, InstanceRaw>(
            r#"
            SELECT * FROM instances
            WHERE start_day <= ? AND end_day >= ?
            ORDER BY start_day, begin_time
            "#,
        )
        .bind(end_day)
        .bind(start_day)
        .fetch_all(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Find instances for days [{}, {}] failed. DB returned error: {:?}",
                start_day, end_day, err
            );
        })?
        .into_iter()
        .map(Instance::try_from)
        .collect()
    }

    async fn count(&self) -> anyhow::Result<i64> {
        let count: (i64,) = sqlx::query_as("SELECT COUNT(*) FROM instances")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.0)
    }
}
