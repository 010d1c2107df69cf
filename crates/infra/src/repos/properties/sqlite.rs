use std::sync::Arc;

use sqlx::{FromRow, SqlitePool};
use tracing::{error, instrument};

use super::{IPropertiesRepo, InstancesWindow};
use crate::repos::shared::state_cache::StateCache;

pub struct SqlitePropertiesRepo {
    pool: SqlitePool,
    state_cache: Arc<StateCache>,
}

impl SqlitePropertiesRepo {
    pub fn new(pool: SqlitePool, state_cache: Arc<StateCache>) -> Self {
        Self { pool, state_cache }
    }
}

#[derive(Debug, FromRow)]
struct WindowRaw {
    local_timezone: String,
    min_instance: i64,
    max_instance: i64,
}

impl TryFrom<WindowRaw> for InstancesWindow {
    type Error = anyhow::Error;

    fn try_from(w: WindowRaw) -> anyhow::Result<Self> {
        Ok(Self {
            local_timezone: w
                .local_timezone
                .parse()
                .map_err(|_| anyhow::anyhow!("Invalid instances timezone: {}", w.local_timezone))?,
            min_instance: w.min_instance,
            max_instance: w.max_instance,
        })
    }
}

#[async_trait::async_trait]
impl IPropertiesRepo for SqlitePropertiesRepo {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        if let Some(cached) = self.state_cache.values.get(key).await {
            return Ok(cached);
        }
        let value: Option<(Option<String>,)> =
            sqlx::query_as("SELECT value FROM calendar_cache WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .inspect_err(|err| {
                    error!(
                        "Get cache property {} failed. DB returned error: {:?}",
                        key, err
                    );
                })?;
        let value = value.and_then(|v| v.0);
        self.state_cache
            .values
            .insert(key.to_string(), value.clone())
            .await;
        Ok(value)
    }

    #[instrument(skip(self))]
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO calendar_cache(key, value)
            VALUES(?, ?)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!(
                "Set cache property {} failed. DB returned error: {:?}",
                key, err
            );
        })?;
        self.state_cache.invalidate_value(key).await;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn window(&self) -> anyhow::Result<InstancesWindow> {
        if let Some(window) = self.state_cache.window.get(&()).await {
            return Ok(window);
        }
        let raw: WindowRaw = sqlx::query_as(
            "SELECT local_timezone, min_instance, max_instance FROM calendar_metadata WHERE id = 0",
        )
        .fetch_one(&self.pool)
        .await
        .inspect_err(|err| {
            error!("Read instances window failed. DB returned error: {:?}", err);
        })?;
        let window = InstancesWindow::try_from(raw)?;
        self.state_cache.window.insert((), window).await;
        Ok(window)
    }

    #[instrument(skip(self))]
    async fn clear_window(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE calendar_metadata SET min_instance = 0, max_instance = 0
            WHERE id = 0
            "#,
        )
        .execute(&self.pool)
        .await
        .inspect_err(|err| {
            error!("Clear instances window failed. DB returned error: {:?}", err);
        })?;
        self.state_cache.invalidate_window().await;
        Ok(())
    }
}
