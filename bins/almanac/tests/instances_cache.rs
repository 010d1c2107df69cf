mod helpers;

use almanac_domain::{EventDuration, EventStatus, time};
use almanac_provider::EventPayload;
use chrono::{DateTime, TimeZone, Utc};
use chrono_tz::{America::Los_Angeles, America::New_York, UTC};
use helpers::setup::{spawn_provider, spawn_provider_at};

const HOUR: i64 = 60 * 60 * 1000;
const DAY: i64 = 24 * HOUR;
const MINIMUM_EXPANSION_SPAN: i64 = 62 * DAY;

fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
}

#[tokio::test]
async fn acquiring_a_small_range_widens_to_the_minimum_span() {
    let now = utc(2024, 6, 1, 0, 0).timestamp_millis();
    let (provider, _host, _path) = spawn_provider(now, UTC).await;

    let calendar = provider
        .create_calendar(Default::default())
        .await
        .unwrap();
    provider
        .create_event(
            EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 1, 1, 9, 0),
                duration: Some(EventDuration::from_seconds(3600)),
                rrule: Some("FREQ=DAILY".into()),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();

    let instances = provider.query_instances(now, now + DAY).await.unwrap();
    assert!(!instances.is_empty());

    let window = provider.context().repos.properties.window().await.unwrap();
    assert!(!window.is_empty());
    assert!(window.min_instance <= now);
    assert!(window.max_instance >= now + DAY);
    assert!(window.max_instance - window.min_instance >= MINIMUM_EXPANSION_SPAN);
}

#[tokio::test]
async fn acquire_range_is_idempotent() {
    let now = utc(2024, 6, 1, 0, 0).timestamp_millis();
    let (provider, _host, _path) = spawn_provider(now, UTC).await;

    let calendar = provider.create_calendar(Default::default()).await.unwrap();
    provider
        .create_event(
            EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 5, 1, 9, 0),
                duration: Some(EventDuration::from_seconds(3600)),
                rrule: Some("FREQ=WEEKLY;BYDAY=MO,FR".into()),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();

    let first = provider.query_instances(now, now + DAY).await.unwrap();
    let first_window = provider.context().repos.properties.window().await.unwrap();
    let second = provider.query_instances(now, now + DAY).await.unwrap();
    let second_window = provider.context().repos.properties.window().await.unwrap();

    assert_eq!(first, second);
    assert_eq!(first_window, second_window);
}

#[tokio::test]
async fn covered_subranges_extend_only_the_needed_side() {
    let now = utc(2024, 6, 1, 0, 0).timestamp_millis();
    let (provider, _host, _path) = spawn_provider(now, UTC).await;
    provider.create_calendar(Default::default()).await.unwrap();

    provider.query_instances(now, now + DAY).await.unwrap();
    let window = provider.context().repos.properties.window().await.unwrap();

    // A range past the current max extends the window upward only
    let far_end = window.max_instance + 10 * DAY;
    provider
        .query_instances(window.max_instance, far_end)
        .await
        .unwrap();
    let extended = provider.context().repos.properties.window().await.unwrap();
    assert_eq!(extended.min_instance, window.min_instance);
    assert!(extended.max_instance >= far_end);
}

#[tokio::test]
async fn timezone_change_rebuilds_in_the_new_zone() {
    let now = utc(2024, 6, 10, 0, 0).timestamp_millis();
    let (provider, _host, path) = spawn_provider(now, Los_Angeles).await;

    let calendar = provider.create_calendar(Default::default()).await.unwrap();
    // 01:00Z on Jun 10 = 18:00 the previous day in Los Angeles,
    // 21:00 the previous day in New York
    provider
        .create_event(
            EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 6, 10, 1, 0),
                dtend: Some(utc(2024, 6, 10, 2, 0)),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();

    let instances = provider.query_instances(now - DAY, now + DAY).await.unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].start_minute, 18 * 60);
    // Quiesce the first provider's background worker before switching zones
    provider.scheduler().stop();
    tokio::time::sleep(std::time::Duration::from_millis(700)).await;

    // The device moved zones; a new provider over the same database picks
    // the change up and rebuilds
    let (moved, _host2) = spawn_provider_at(&path, now, New_York).await;
    moved.on_timezone_changed().await.unwrap();
    let instances = moved.query_instances(now - DAY, now + DAY).await.unwrap();
    assert_eq!(instances.len(), 1);
    assert_eq!(instances[0].start_minute, 21 * 60);

    let window = moved.context().repos.properties.window().await.unwrap();
    assert_eq!(window.local_timezone, New_York);
}

#[tokio::test]
async fn all_day_event_spanning_dst_keeps_utc_day_fields() {
    let now = utc(2024, 3, 9, 12, 0).timestamp_millis();
    let (provider, _host, _path) = spawn_provider(now, Los_Angeles).await;

    let calendar = provider.create_calendar(Default::default()).await.unwrap();
    provider
        .create_event(
            EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 3, 10, 0, 0),
                duration: Some(EventDuration::from_days(1)),
                all_day: true,
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();

    let instances = provider
        .query_instances(
            utc(2024, 3, 9, 0, 0).timestamp_millis(),
            utc(2024, 3, 12, 0, 0).timestamp_millis(),
        )
        .await
        .unwrap();
    assert_eq!(instances.len(), 1);
    let instance = &instances[0];
    let expected_day = time::julian_day(utc(2024, 3, 10, 0, 0), &UTC);
    assert_eq!(instance.start_day, expected_day);
    assert_eq!(instance.end_day, expected_day);
    assert_eq!(instance.start_minute, 0);
    assert_eq!(instance.end_minute, 24 * 60);
}

#[tokio::test]
async fn cancelling_exception_removes_one_occurrence() {
    let now = utc(2024, 6, 1, 0, 0).timestamp_millis();
    let (provider, _host, _path) = spawn_provider(now, UTC).await;

    let calendar = provider.create_calendar(Default::default()).await.unwrap();
    provider
        .create_event(
            EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 6, 3, 10, 0),
                duration: Some(EventDuration::from_seconds(3600)),
                rrule: Some("FREQ=DAILY;COUNT=5".into()),
                sync_id: Some("base-1".into()),
                ..Default::default()
            },
            true,
        )
        .await
        .unwrap();
    provider
        .create_event(
            EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 6, 4, 10, 0),
                dtend: Some(utc(2024, 6, 4, 11, 0)),
                status: EventStatus::Cancelled,
                original_sync_id: Some("base-1".into()),
                original_instance_time: Some(utc(2024, 6, 4, 10, 0)),
                ..Default::default()
            },
            true,
        )
        .await
        .unwrap();

    let instances = provider
        .query_instances(
            utc(2024, 6, 1, 0, 0).timestamp_millis(),
            utc(2024, 6, 10, 0, 0).timestamp_millis(),
        )
        .await
        .unwrap();
    assert_eq!(instances.len(), 4);
    assert!(
        instances
            .iter()
            .all(|i| i.begin != utc(2024, 6, 4, 10, 0))
    );
}

#[tokio::test]
async fn storage_recovery_rebuilds_the_cache() {
    let now = utc(2024, 6, 1, 0, 0).timestamp_millis();
    let (provider, _host, _path) = spawn_provider(now, UTC).await;
    let calendar = provider.create_calendar(Default::default()).await.unwrap();

    // While storage is low every write is refused
    provider.on_storage_low();
    let refused = provider
        .create_event(
            almanac_provider::EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 6, 5, 9, 0),
                dtend: Some(utc(2024, 6, 5, 10, 0)),
                ..Default::default()
            },
            false,
        )
        .await;
    assert!(matches!(
        refused,
        Err(almanac_provider::ProviderError::ResourceUnavailable)
    ));
    provider.on_storage_ok().await.unwrap();

    provider.query_instances(now, now + DAY).await.unwrap();
    assert!(!provider.context().repos.properties.window().await.unwrap().is_empty());

    provider.on_storage_ok().await.unwrap();
    assert!(provider.context().repos.properties.window().await.unwrap().is_empty());

    // The next acquire rebuilds
    provider.query_instances(now, now + DAY).await.unwrap();
    assert!(!provider.context().repos.properties.window().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_recurring_update_refreshes_only_its_rows() {
    let now = utc(2024, 6, 1, 0, 0).timestamp_millis();
    let (provider, _host, _path) = spawn_provider(now, UTC).await;

    let calendar = provider.create_calendar(Default::default()).await.unwrap();
    let event = provider
        .create_event(
            EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 6, 5, 9, 0),
                dtend: Some(utc(2024, 6, 5, 10, 0)),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();

    provider.query_instances(now, now + 30 * DAY).await.unwrap();
    let window_before = provider.context().repos.properties.window().await.unwrap();

    provider
        .update_event(
            event.id.clone(),
            almanac_provider::UpdateEventChanges {
                dtstart: Some(utc(2024, 6, 6, 9, 0)),
                dtend: Some(Some(utc(2024, 6, 6, 10, 0))),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();

    // The window survived (no wholesale invalidation)...
    let window_after = provider.context().repos.properties.window().await.unwrap();
    assert_eq!(window_before, window_after);

    // ...and the event's rows moved
    let instances = provider.query_instances(now, now + 30 * DAY).await.unwrap();
    let of_event: Vec<_> = instances.iter().filter(|i| i.event_id == event.id).collect();
    assert_eq!(of_event.len(), 1);
    assert_eq!(of_event[0].begin, utc(2024, 6, 6, 9, 0));
}

#[tokio::test]
async fn last_date_is_maintained_by_the_write_path() {
    let now = utc(2024, 1, 1, 0, 0).timestamp_millis();
    let (provider, _host, _path) = spawn_provider(now, UTC).await;

    let calendar = provider.create_calendar(Default::default()).await.unwrap();
    let event = provider
        .create_event(
            EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 1, 2, 9, 0),
                duration: Some("PT1H".parse().unwrap()),
                rrule: Some("FREQ=WEEKLY;BYDAY=TU,TH;COUNT=6".into()),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();
    assert_eq!(event.last_date, Some(utc(2024, 1, 18, 10, 0)));

    let unbounded = provider
        .create_event(
            EventPayload {
                calendar_id: calendar.id.clone(),
                dtstart: utc(2024, 1, 2, 9, 0),
                duration: Some("PT1H".parse().unwrap()),
                rrule: Some("FREQ=DAILY".into()),
                ..Default::default()
            },
            false,
        )
        .await
        .unwrap();
    assert_eq!(unbounded.last_date, None);
}
