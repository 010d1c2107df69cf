mod sqlite;

use almanac_domain::{ID, Reminder};
pub use sqlite::SqliteReminderRepo;

#[async_trait::async_trait]
pub trait IReminderRepo: Send + Sync {
    async fn insert(&self, reminder: &Reminder) -> anyhow::Result<()>;
    async fn save(&self, reminder: &Reminder) -> anyhow::Result<()>;
    async fn find(&self, reminder_id: &ID) -> anyhow::Result<Option<Reminder>>;
    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<Reminder>>;
    async fn delete(&self, reminder_id: &ID) -> anyhow::Result<()>;
    async fn delete_by_event(&self, event_id: &ID) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use almanac_domain::{Calendar, CalendarEvent, Reminder, ReminderMethod};
    use chrono::DateTime;

    use crate::setup_test_context;

    #[tokio::test]
    async fn crud() {
        let ctx = setup_test_context().await.unwrap();
        let calendar = Calendar::default();
        ctx.repos.calendars.insert(&calendar).await.unwrap();
        let event = CalendarEvent {
            calendar_id: calendar.id.clone(),
            dtstart: DateTime::from_timestamp_millis(1000 * 60 * 60).unwrap(),
            dtend: Some(DateTime::from_timestamp_millis(2 * 1000 * 60 * 60).unwrap()),
            ..Default::default()
        };
        ctx.repos.events.insert(&event).await.unwrap();

        let reminder = Reminder::new(event.id.clone(), 10, ReminderMethod::Alert);
        ctx.repos.reminders.insert(&reminder).await.unwrap();

        // The (event, minutes, method) triple is unique
        let duplicate = Reminder::new(event.id.clone(), 10, ReminderMethod::Alert);
        assert!(ctx.repos.reminders.insert(&duplicate).await.is_err());

        let by_event = ctx.repos.reminders.find_by_event(&event.id).await.unwrap();
        assert_eq!(by_event.len(), 1);
        assert_eq!(by_event[0], reminder);

        let mut updated = reminder.clone();
        updated.minutes = 15;
        ctx.repos.reminders.save(&updated).await.unwrap();
        let found = ctx.repos.reminders.find(&reminder.id).await.unwrap().unwrap();
        assert_eq!(found.minutes, 15);

        ctx.repos.reminders.delete_by_event(&event.id).await.unwrap();
        assert!(ctx.repos.reminders.find(&reminder.id).await.unwrap().is_none());
    }
}
