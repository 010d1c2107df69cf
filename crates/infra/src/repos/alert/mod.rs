mod sqlite;

use almanac_domain::{AlertState, CalendarAlert, ID};
use chrono::{DateTime, Utc};
pub use sqlite::SqliteAlertRepo;

/// One row of the due-reminders join: an instance whose reminder should
/// produce an alarm.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueReminder {
    pub event_id: ID,
    pub begin: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub alarm_time: DateTime<Utc>,
    pub minutes: i32,
    pub title: Option<String>,
}

#[async_trait::async_trait]
pub trait IAlertRepo: Send + Sync {
    /// Insert a scheduled alert; a row already carrying the same
    /// `(alarm_time, begin, event)` triple is left untouched.
    async fn insert(&self, alert: &CalendarAlert) -> anyhow::Result<()>;
    async fn find(&self, alert_id: &ID) -> anyhow::Result<Option<CalendarAlert>>;
    async fn find_by_instance(
        &self,
        event_id: &ID,
        begin: i64,
        end: i64,
    ) -> anyhow::Result<Vec<CalendarAlert>>;
    async fn find_all(&self) -> anyhow::Result<Vec<CalendarAlert>>;
    async fn set_state(
        &self,
        alert_id: &ID,
        state: AlertState,
        now_ms: i64,
    ) -> anyhow::Result<()>;
    async fn delete(&self, alert_id: &ID) -> anyhow::Result<()>;
    /// Drop every alert still in the scheduled state; returns how many.
    async fn delete_scheduled(&self) -> anyhow::Result<u64>;
    /// Drop alerts whose instance disappeared, whose minutes no longer
    /// match any reminder of the event (minutes 0 excepted), or that are
    /// older than the threshold.
    async fn purge_stale(&self, now_ms: i64, old_threshold_ms: i64) -> anyhow::Result<u64>;
    /// Instances × reminders due between `start_ms` and `horizon_ms` with
    /// no alert row yet; ordered by alarm time, then begin, then title.
    async fn find_due_reminders(
        &self,
        start_ms: i64,
        horizon_ms: i64,
        now_ms: i64,
    ) -> anyhow::Result<Vec<DueReminder>>;
}

#[cfg(test)]
mod tests {
    use almanac_domain::{
        Calendar,
        CalendarAlert,
        CalendarEvent,
        Instance,
        Reminder,
        ReminderMethod,
    };
    use chrono::DateTime;
    use chrono_tz::UTC;

    use crate::setup_test_context;

    fn ms(v: i64) -> chrono::DateTime<chrono::Utc> {
        DateTime::from_timestamp_millis(v).unwrap()
    }

    const HOUR: i64 = 1000 * 60 * 60;

    #[tokio::test]
    async fn due_reminders_join_and_alert_dedup() {
        let ctx = setup_test_context().await.unwrap();
        let calendar = Calendar::default();
        ctx.repos.calendars.insert(&calendar).await.unwrap();
        let event = CalendarEvent {
            calendar_id: calendar.id.clone(),
            title: Some("Standup".into()),
            dtstart: ms(10 * HOUR),
            dtend: Some(ms(11 * HOUR)),
            ..Default::default()
        };
        ctx.repos.events.insert(&event).await.unwrap();
        ctx.repos
            .instances
            .upsert(&[Instance::new(event.id.clone(), ms(10 * HOUR), ms(11 * HOUR), &UTC)])
            .await
            .unwrap();
        ctx.repos
            .reminders
            .insert(&Reminder::new(event.id.clone(), 30, ReminderMethod::Alert))
            .await
            .unwrap();
        // Email reminders never produce alarms
        ctx.repos
            .reminders
            .insert(&Reminder::new(event.id.clone(), 10, ReminderMethod::Email))
            .await
            .unwrap();

        let now = 8 * HOUR;
        let due = ctx
            .repos
            .alerts
            .find_due_reminders(now - 2 * HOUR, now + 24 * HOUR, now)
            .await
            .unwrap();
        assert_eq!(due.len(), 1);
        let due = &due[0];
        assert_eq!(due.minutes, 30);
        assert_eq!(due.alarm_time, ms(10 * HOUR - 30 * 60 * 1000));
        assert_eq!(due.title.as_deref(), Some("Standup"));

        // Recording the alert removes it from the next query
        let alert = CalendarAlert::scheduled(
            due.event_id.clone(),
            due.begin,
            due.end,
            due.alarm_time,
            due.minutes,
            ms(now),
        );
        ctx.repos.alerts.insert(&alert).await.unwrap();
        // Same triple again is a no-op
        ctx.repos.alerts.insert(&alert).await.unwrap();
        assert_eq!(ctx.repos.alerts.find_all().await.unwrap().len(), 1);

        let due = ctx
            .repos
            .alerts
            .find_due_reminders(now - 2 * HOUR, now + 24 * HOUR, now)
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn deselected_calendars_produce_no_alarms() {
        let ctx = setup_test_context().await.unwrap();
        let calendar = Calendar {
            selected: false,
            ..Default::default()
        };
        ctx.repos.calendars.insert(&calendar).await.unwrap();
        let event = CalendarEvent {
            calendar_id: calendar.id.clone(),
            dtstart: ms(10 * HOUR),
            dtend: Some(ms(11 * HOUR)),
            ..Default::default()
        };
        ctx.repos.events.insert(&event).await.unwrap();
        ctx.repos
            .instances
            .upsert(&[Instance::new(event.id.clone(), ms(10 * HOUR), ms(11 * HOUR), &UTC)])
            .await
            .unwrap();
        ctx.repos
            .reminders
            .insert(&Reminder::new(event.id.clone(), 30, ReminderMethod::Alert))
            .await
            .unwrap();

        let due = ctx
            .repos
            .alerts
            .find_due_reminders(0, 48 * HOUR, HOUR)
            .await
            .unwrap();
        assert!(due.is_empty());
    }

    #[tokio::test]
    async fn purge_drops_orphans_mismatches_and_old_alerts() {
        let ctx = setup_test_context().await.unwrap();
        let calendar = Calendar::default();
        ctx.repos.calendars.insert(&calendar).await.unwrap();
        let event = CalendarEvent {
            calendar_id: calendar.id.clone(),
            dtstart: ms(10 * HOUR),
            dtend: Some(ms(11 * HOUR)),
            ..Default::default()
        };
        ctx.repos.events.insert(&event).await.unwrap();
        ctx.repos
            .instances
            .upsert(&[Instance::new(event.id.clone(), ms(10 * HOUR), ms(11 * HOUR), &UTC)])
            .await
            .unwrap();
        ctx.repos
            .reminders
            .insert(&Reminder::new(event.id.clone(), 30, ReminderMethod::Alert))
            .await
            .unwrap();

        let now = 9 * HOUR;
        // Valid: matching instance and reminder
        let valid = CalendarAlert::scheduled(
            event.id.clone(),
            ms(10 * HOUR),
            ms(11 * HOUR),
            ms(10 * HOUR - 30 * 60 * 1000),
            30,
            ms(now),
        );
        // Orphan: no instance with this begin/end
        let orphan = CalendarAlert::scheduled(
            event.id.clone(),
            ms(20 * HOUR),
            ms(21 * HOUR),
            ms(20 * HOUR),
            30,
            ms(now),
        );
        // Mismatch: no reminder with minutes = 45
        let mismatch = CalendarAlert::scheduled(
            event.id.clone(),
            ms(10 * HOUR),
            ms(11 * HOUR),
            ms(10 * HOUR - 45 * 60 * 1000),
            45,
            ms(now),
        );
        // Minutes 0 alerts are exempt from the reminder-match rule
        let zero_minutes = CalendarAlert::scheduled(
            event.id.clone(),
            ms(10 * HOUR),
            ms(11 * HOUR),
            ms(10 * HOUR),
            0,
            ms(now),
        );
        for alert in [&valid, &orphan, &mismatch, &zero_minutes] {
            ctx.repos.alerts.insert(alert).await.unwrap();
        }

        let purged = ctx.repos.alerts.purge_stale(now, 7 * 24 * HOUR).await.unwrap();
        assert_eq!(purged, 2);
        let left = ctx.repos.alerts.find_all().await.unwrap();
        assert_eq!(left.len(), 2);

        // Old alerts go regardless of validity
        let purged = ctx.repos.alerts.purge_stale(now + 30 * 24 * HOUR, 7 * 24 * HOUR).await.unwrap();
        assert_eq!(purged, 2);
    }
}
