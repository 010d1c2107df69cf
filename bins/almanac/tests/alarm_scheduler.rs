mod helpers;

use std::time::Duration;

use almanac_domain::{AlertState, Calendar, CalendarEvent, Reminder, ReminderMethod};
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::UTC;
use helpers::setup::spawn_provider;

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

/// Seed an event with reminders without going through the provider entry
/// points, so the test controls exactly when the scheduler is poked.
async fn seed_event_with_reminders(
    ctx: &almanac_infra::AlmanacContext,
    dtstart: DateTime<Utc>,
    reminder_minutes: &[i32],
) -> CalendarEvent {
    let calendar = Calendar::default();
    ctx.repos.calendars.insert(&calendar).await.unwrap();
    let event = CalendarEvent {
        calendar_id: calendar.id.clone(),
        title: Some("Meeting".into()),
        dtstart,
        dtend: Some(dtstart + chrono::TimeDelta::hours(1)),
        ..Default::default()
    };
    ctx.repos.events.insert(&event).await.unwrap();
    for &minutes in reminder_minutes {
        ctx.repos
            .reminders
            .insert(&Reminder::new(event.id.clone(), minutes, ReminderMethod::Alert))
            .await
            .unwrap();
    }
    event
}

#[tokio::test]
async fn a_burst_of_requests_runs_exactly_one_pass() {
    let now = utc(2024, 6, 1, 8, 0);
    let (provider, host, _path) = spawn_provider(now.timestamp_millis(), UTC).await;
    let event = seed_event_with_reminders(
        provider.context(),
        now + chrono::TimeDelta::hours(2),
        &[30, 29, 28, 27, 26],
    )
    .await;

    for _ in 0..10 {
        provider.schedule_next(false);
    }
    // One debounce window (300 ms) plus headroom for the pass itself
    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(provider.scheduler().passes(), 1);

    // The pass persisted the alarms inside the one-minute grace of the
    // earliest one: begin - 30min and begin - 29min
    let alerts = provider.get_alerts().await.unwrap();
    assert_eq!(alerts.len(), 2);
    let begin = event.dtstart;
    let alarm_times: Vec<_> = alerts.iter().map(|a| a.alarm_time).collect();
    assert!(alarm_times.contains(&(begin - chrono::TimeDelta::minutes(30))));
    assert!(alarm_times.contains(&(begin - chrono::TimeDelta::minutes(29))));
    assert!(alerts.iter().all(|a| a.state == AlertState::Scheduled));

    assert_eq!(host.fired.lock().unwrap().len(), 2);
    // The re-arm check sits one grace minute past the earliest alarm
    let checks = host.checks.lock().unwrap();
    assert_eq!(
        checks.last().copied(),
        Some(begin - chrono::TimeDelta::minutes(30) + chrono::TimeDelta::minutes(1))
    );
}

#[tokio::test]
async fn scheduled_alerts_survive_and_do_not_duplicate() {
    let now = utc(2024, 6, 1, 8, 0);
    let (provider, host, _path) = spawn_provider(now.timestamp_millis(), UTC).await;
    let event =
        seed_event_with_reminders(provider.context(), now + chrono::TimeDelta::hours(1), &[30])
            .await;

    provider.schedule_next(false);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(provider.scheduler().passes(), 1);
    let alerts = provider.get_alerts().await.unwrap();
    assert_eq!(alerts.len(), 1);
    assert_eq!(
        alerts[0].alarm_time,
        event.dtstart - chrono::TimeDelta::minutes(30)
    );
    assert_eq!(host.fired.lock().unwrap().len(), 1);

    // A second pass finds the alert already recorded and arms nothing new
    provider.schedule_next(false);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    assert_eq!(provider.scheduler().passes(), 2);
    assert_eq!(provider.get_alerts().await.unwrap().len(), 1);
    assert_eq!(host.fired.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn remove_old_replaces_scheduled_alerts() {
    let now = utc(2024, 6, 1, 8, 0);
    let (provider, _host, _path) = spawn_provider(now.timestamp_millis(), UTC).await;
    seed_event_with_reminders(provider.context(), now + chrono::TimeDelta::hours(1), &[30]).await;

    provider.schedule_next(false);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let first = provider.get_alerts().await.unwrap();
    assert_eq!(first.len(), 1);

    provider.schedule_next(true);
    tokio::time::sleep(Duration::from_millis(1200)).await;
    let second = provider.get_alerts().await.unwrap();
    assert_eq!(second.len(), 1);
    // The row was dropped and re-created
    assert_ne!(first[0].id, second[0].id);
}

#[tokio::test]
async fn reminders_outside_the_horizon_wait() {
    let now = utc(2024, 6, 1, 8, 0);
    let (provider, host, _path) = spawn_provider(now.timestamp_millis(), UTC).await;
    // Event in three days: the 30 minute reminder is past the 24h horizon
    seed_event_with_reminders(provider.context(), now + chrono::TimeDelta::days(3), &[30]).await;

    provider.schedule_next(false);
    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert!(provider.get_alerts().await.unwrap().is_empty());
    assert!(host.fired.lock().unwrap().is_empty());
    // With nothing due, the next check lands a horizon away
    assert_eq!(
        host.checks.lock().unwrap().last().copied(),
        Some(now + chrono::TimeDelta::hours(24))
    );
}

#[tokio::test]
async fn slack_catches_recently_missed_reminders() {
    let now = utc(2024, 6, 1, 8, 0);
    let (provider, host, _path) = spawn_provider(now.timestamp_millis(), UTC).await;
    // The alarm instant was an hour ago, but the event is still running:
    // within the two hour slack it still fires
    seed_event_with_reminders(
        provider.context(),
        now - chrono::TimeDelta::minutes(30),
        &[30],
    )
    .await;

    provider.schedule_next(false);
    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert_eq!(provider.get_alerts().await.unwrap().len(), 1);
    assert_eq!(host.fired.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn stopped_scheduler_ignores_requests() {
    let now = utc(2024, 6, 1, 8, 0);
    let (provider, _host, _path) = spawn_provider(now.timestamp_millis(), UTC).await;
    seed_event_with_reminders(provider.context(), now + chrono::TimeDelta::hours(1), &[30]).await;

    provider.scheduler().stop();
    provider.schedule_next(false);
    tokio::time::sleep(Duration::from_millis(800)).await;

    assert_eq!(provider.scheduler().passes(), 0);
    assert!(provider.get_alerts().await.unwrap().is_empty());
}

#[tokio::test]
async fn default_method_reminders_do_not_fire_alarms() {
    let now = utc(2024, 6, 1, 8, 0);
    let (provider, host, _path) = spawn_provider(now.timestamp_millis(), UTC).await;
    let calendar = Calendar::default();
    provider
        .context()
        .repos
        .calendars
        .insert(&calendar)
        .await
        .unwrap();
    let event = CalendarEvent {
        calendar_id: calendar.id.clone(),
        dtstart: now + chrono::TimeDelta::hours(1),
        dtend: Some(now + chrono::TimeDelta::hours(2)),
        ..Default::default()
    };
    provider.context().repos.events.insert(&event).await.unwrap();
    provider
        .context()
        .repos
        .reminders
        .insert(&Reminder::new(event.id.clone(), 30, ReminderMethod::Email))
        .await
        .unwrap();

    provider.schedule_next(false);
    tokio::time::sleep(Duration::from_millis(1200)).await;

    assert!(provider.get_alerts().await.unwrap().is_empty());
    assert!(host.fired.lock().unwrap().is_empty());
}
