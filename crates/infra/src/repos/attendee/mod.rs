mod sqlite;

use almanac_domain::{Attendee, ID};
pub use sqlite::SqliteAttendeeRepo;

#[async_trait::async_trait]
pub trait IAttendeeRepo: Send + Sync {
    async fn insert(&self, attendee: &Attendee) -> anyhow::Result<()>;
    async fn save(&self, attendee: &Attendee) -> anyhow::Result<()>;
    async fn find(&self, attendee_id: &ID) -> anyhow::Result<Option<Attendee>>;
    async fn find_by_event(&self, event_id: &ID) -> anyhow::Result<Vec<Attendee>>;
    async fn delete(&self, attendee_id: &ID) -> anyhow::Result<()>;
}

#[cfg(test)]
mod tests {
    use almanac_domain::{Attendee, AttendeeStatus, Calendar, CalendarEvent};
    use chrono::DateTime;

    use crate::setup_test_context;

    #[tokio::test]
    async fn crud() {
        let ctx = setup_test_context().await.unwrap();
        let calendar = Calendar::default();
        ctx.repos.calendars.insert(&calendar).await.unwrap();
        let event = CalendarEvent {
            calendar_id: calendar.id.clone(),
            dtstart: DateTime::from_timestamp_millis(0).unwrap(),
            dtend: Some(DateTime::from_timestamp_millis(1000).unwrap()),
            ..Default::default()
        };
        ctx.repos.events.insert(&event).await.unwrap();

        let mut attendee = Attendee {
            event_id: event.id.clone(),
            name: Some("Ada".into()),
            email: Some("ada@example.com".into()),
            ..Default::default()
        };
        ctx.repos.attendees.insert(&attendee).await.unwrap();

        attendee.status = AttendeeStatus::Accepted;
        ctx.repos.attendees.save(&attendee).await.unwrap();

        let by_event = ctx.repos.attendees.find_by_event(&event.id).await.unwrap();
        assert_eq!(by_event.len(), 1);
        assert_eq!(by_event[0].status, AttendeeStatus::Accepted);

        // Deleting the event cascades
        ctx.repos.events.delete(&event.id).await.unwrap();
        assert!(ctx.repos.attendees.find(&attendee.id).await.unwrap().is_none());
    }
}
