mod sqlite;

use almanac_domain::{ID, Instance};
pub use sqlite::SqliteInstanceRepo;

use super::properties::InstancesWindow;

#[async_trait::async_trait]
pub trait IInstanceRepo: Send + Sync {
    /// Wipe the instances table and install a freshly materialized window;
    /// one transaction, so readers see either the old window or the new
    /// one, never a partially built table.
    async fn replace_window(
        &self,
        instances: &[Instance],
        window: &InstancesWindow,
    ) -> anyhow::Result<()>;
    /// Add instances materialized for an extension of the current window
    /// and move the window bounds, in one transaction.
    async fn extend_window(
        &self,
        instances: &[Instance],
        window: &InstancesWindow,
    ) -> anyhow::Result<()>;
    /// Upsert instances of a single event without touching the window,
    /// used when a non-recurring event changes inside the window.
    async fn upsert(&self, instances: &[Instance]) -> anyhow::Result<()>;
    async fn delete_for_event(&self, event_id: &ID) -> anyhow::Result<()>;
    /// Instances overlapping `[begin, end]` (epoch ms), ordered by start.
    async fn find_in_range(&self, begin: i64, end: i64) -> anyhow::Result<Vec<Instance>>;
    /// Instances overlapping the Julian day range, ordered by start day.
    async fn find_by_days(&self, start_day: i64, end_day: i64) -> anyhow::Result<Vec<Instance>>;
    async fn count(&self) -> anyhow::Result<i64>;
}
