mod sqlite;

use almanac_domain::{Calendar, ID};
pub use sqlite::SqliteCalendarRepo;

#[async_trait::async_trait]
pub trait ICalendarRepo: Send + Sync {
    async fn insert(&self, calendar: &Calendar) -> anyhow::Result<()>;
    async fn save(&self, calendar: &Calendar) -> anyhow::Result<()>;
    async fn find(&self, calendar_id: &ID) -> anyhow::Result<Option<Calendar>>;
    async fn find_all(&self) -> anyhow::Result<Vec<Calendar>>;
    /// Deletes the calendar; its events, instances and alerts cascade.
    async fn delete(&self, calendar_id: &ID) -> anyhow::Result<()>;
}
