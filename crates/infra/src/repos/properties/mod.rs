mod sqlite;

use std::convert::TryFrom;

use chrono_tz::Tz;
pub use sqlite::SqlitePropertiesRepo;

/// Keys of the calendar_cache key/value table.
pub const TIMEZONE_TYPE_KEY: &str = "timezoneType";
pub const TIMEZONE_INSTANCES_KEY: &str = "timezoneInstances";
pub const TIMEZONE_INSTANCES_PREVIOUS_KEY: &str = "timezoneInstancesPrevious";
pub const TIMEZONE_DATABASE_VERSION_KEY: &str = "timezoneDatabaseVersion";

/// Initial value of `timezoneInstancesPrevious` before any HOME zone was
/// ever recorded.
pub const TIMEZONE_PREVIOUS_SENTINEL: &str = "GMT";

/// Whether the instances cache follows the device zone or a user-pinned
/// home zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimezoneType {
    Auto,
    Home,
}

impl From<TimezoneType> for String {
    fn from(t: TimezoneType) -> Self {
        match t {
            TimezoneType::Auto => "auto".into(),
            TimezoneType::Home => "home".into(),
        }
    }
}

impl TryFrom<String> for TimezoneType {
    type Error = anyhow::Error;
    fn try_from(t: String) -> anyhow::Result<TimezoneType> {
        Ok(match &t[..] {
            "auto" => TimezoneType::Auto,
            "home" => TimezoneType::Home,
            _ => Err(anyhow::anyhow!("Invalid timezone type"))?,
        })
    }
}

/// The one-row description of which UTC window is materialized, and in
/// which zone. `max_instance == 0` means nothing is materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstancesWindow {
    pub local_timezone: Tz,
    pub min_instance: i64,
    pub max_instance: i64,
}

impl InstancesWindow {
    pub fn is_empty(&self) -> bool {
        self.max_instance == 0
    }

    pub fn covers(&self, begin: i64, end: i64) -> bool {
        !self.is_empty() && self.min_instance <= begin && end <= self.max_instance
    }
}

#[async_trait::async_trait]
pub trait IPropertiesRepo: Send + Sync {
    async fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> anyhow::Result<()>;
    async fn window(&self) -> anyhow::Result<InstancesWindow>;
    /// Reset the window to "nothing materialized"; the next acquire
    /// rebuilds.
    async fn clear_window(&self) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use crate::{repos::TIMEZONE_TYPE_KEY, setup_test_context};

    #[tokio::test]
    async fn seeded_values_and_overwrites() {
        let ctx = setup_test_context().await.unwrap();

        // Seeded by the schema
        assert_eq!(
            ctx.repos.properties.get(TIMEZONE_TYPE_KEY).await.unwrap(),
            Some("auto".into())
        );
        assert_eq!(ctx.repos.properties.get("missing").await.unwrap(), None);

        ctx.repos
            .properties
            .set(TIMEZONE_TYPE_KEY, "home")
            .await
            .unwrap();
        assert_eq!(
            ctx.repos.properties.get(TIMEZONE_TYPE_KEY).await.unwrap(),
            Some("home".into())
        );
    }

    #[tokio::test]
    async fn window_starts_empty_and_clears() {
        let ctx = setup_test_context().await.unwrap();
        let window = ctx.repos.properties.window().await.unwrap();
        assert!(window.is_empty());
        assert!(!window.covers(0, 1));

        ctx.repos.properties.clear_window().await.unwrap();
        assert!(ctx.repos.properties.window().await.unwrap().is_empty());
    }
}
