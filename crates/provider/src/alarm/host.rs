use chrono::{DateTime, Utc};
use tracing::info;

/// Boundary to whatever actually wakes the device. The scheduler records
/// alerts in the database and then asks the host to (a) fire an alarm at
/// the reminder instant and (b) wake the scheduler again for the next pass.
pub trait AlarmHost: Send + Sync {
    /// Arm an alarm at `alarm_time`; re-arming replaces any earlier one.
    fn fire_at(&self, alarm_time: DateTime<Utc>);

    /// Ask for a scheduling pass to run at `at`.
    fn schedule_check_at(&self, at: DateTime<Utc>);
}

/// Host used by the daemon: logs the requests. Embedders supply their own
/// implementation wired to a real alarm service.
pub struct TracingAlarmHost;

impl AlarmHost for TracingAlarmHost {
    fn fire_at(&self, alarm_time: DateTime<Utc>) {
        info!(alarm_time = %alarm_time, "Arming reminder alarm");
    }

    fn schedule_check_at(&self, at: DateTime<Utc>) {
        info!(at = %at, "Arming next scheduling check");
    }
}
