mod sqlite;

use almanac_domain::{CalendarEvent, ID};
pub use sqlite::SqliteEventRepo;

#[async_trait::async_trait]
pub trait IEventRepo: Send + Sync {
    async fn insert(&self, e: &CalendarEvent) -> anyhow::Result<()>;
    async fn save(&self, e: &CalendarEvent) -> anyhow::Result<()>;
    async fn find(&self, event_id: &ID) -> anyhow::Result<Option<CalendarEvent>>;
    async fn find_all(&self) -> anyhow::Result<Vec<CalendarEvent>>;
    async fn find_by_calendar(&self, calendar_id: &ID) -> anyhow::Result<Vec<CalendarEvent>>;
    /// The materialization enumeration: events whose occurrences can touch
    /// `[window_start, window_end]` (epoch ms), plus recurrence exceptions
    /// whose original time falls in the window extended backward by
    /// `exception_slack_ms`.
    async fn find_for_window(
        &self,
        window_start: i64,
        window_end: i64,
        exception_slack_ms: i64,
    ) -> anyhow::Result<Vec<CalendarEvent>>;
    async fn delete(&self, event_id: &ID) -> anyhow::Result<()>;
}
