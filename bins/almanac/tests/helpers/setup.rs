use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
    time::Duration,
};

use almanac_infra::{ISys, setup_context_with_path};
use almanac_provider::{AlarmHost, CalendarProvider};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;

/// Frozen clock and zone, so cache and alarm behavior is reproducible.
pub struct StaticSys {
    pub now_ms: i64,
    pub zone: Tz,
}

impl ISys for StaticSys {
    fn get_timestamp(&self) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(self.now_ms).unwrap()
    }

    fn device_timezone(&self) -> Tz {
        self.zone
    }
}

/// Records what the scheduler asks the host to do.
#[derive(Default)]
pub struct RecordingAlarmHost {
    pub fired: Mutex<Vec<DateTime<Utc>>>,
    pub checks: Mutex<Vec<DateTime<Utc>>>,
}

impl AlarmHost for RecordingAlarmHost {
    fn fire_at(&self, alarm_time: DateTime<Utc>) {
        self.fired.lock().unwrap().push(alarm_time);
    }

    fn schedule_check_at(&self, at: DateTime<Utc>) {
        self.checks.lock().unwrap().push(at);
    }
}

pub fn fresh_db_path() -> PathBuf {
    std::env::temp_dir().join(format!("almanac-it-{}.db", uuid::Uuid::new_v4()))
}

/// A provider over its own throwaway database, with a frozen clock, the
/// given device zone and a short scheduler debounce.
pub async fn spawn_provider(
    now_ms: i64,
    zone: Tz,
) -> (CalendarProvider, Arc<RecordingAlarmHost>, PathBuf) {
    let path = fresh_db_path();
    let (provider, host) = spawn_provider_at(&path, now_ms, zone).await;
    (provider, host, path)
}

/// Open a provider over an existing database file, as after a restart.
pub async fn spawn_provider_at(
    path: &PathBuf,
    now_ms: i64,
    zone: Tz,
) -> (CalendarProvider, Arc<RecordingAlarmHost>) {
    let mut ctx = setup_context_with_path(&path.to_string_lossy())
        .await
        .expect("To setup test context");
    ctx.sys = Arc::new(StaticSys { now_ms, zone });
    let host = Arc::new(RecordingAlarmHost::default());
    let provider =
        CalendarProvider::with_scheduler_delay(ctx, host.clone(), Duration::from_millis(300));
    (provider, host)
}
