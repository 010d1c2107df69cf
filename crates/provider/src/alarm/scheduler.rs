//! Debounced computation of the next reminder alarms.
//!
//! Change notifications call [`AlarmScheduler::schedule_next`]; bursts
//! collapse into one worker pass through the gate below. Each pass runs the
//! §4.5 pipeline: purge stale alerts, make sure the next 24 hours are
//! materialized, record the due reminders as alerts and hand the earliest
//! to the host.

use std::{
    sync::{
        Arc,
        Mutex,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use almanac_domain::CalendarAlert;
use almanac_infra::AlmanacContext;
use chrono::{DateTime, TimeDelta, Utc};
use tracing::{error, info};

use super::host::AlarmHost;
use crate::instances::InstancesCache;

/// Catches reminders missed while the process was dead or the clock was
/// mis-set.
const SCHEDULE_SLACK_MS: i64 = 2 * 60 * 60 * 1000;

/// How far ahead one pass looks for reminders.
const SCHEDULE_HORIZON_MS: i64 = 24 * 60 * 60 * 1000;

/// Alerts older than this are purged no matter what.
const CLEAR_OLD_ALARM_THRESHOLD_MS: i64 = 7 * 24 * 60 * 60 * 1000 + 2 * 60 * 60 * 1000;

/// Alarms within this much of the earliest one are scheduled in the same
/// pass, so near-simultaneous reminders do not chatter the device awake.
const ALARM_GRACE_MS: i64 = 60 * 1000;

/// Coalescing state for the single worker. Owned by the scheduler
/// instance. Requests mark the gate pending and return immediately; the
/// worker claims the pending flags after its debounce sleep, so a burst of
/// requests inside the sleep window becomes a single pass, and a request
/// arriving mid-pass becomes one more.
#[derive(Debug, Default)]
struct DebounceGate {
    running: bool,
    pending: bool,
    remove_pending: bool,
}

#[derive(Clone)]
pub struct AlarmScheduler {
    ctx: AlmanacContext,
    cache: Arc<InstancesCache>,
    host: Arc<dyn AlarmHost>,
    gate: Arc<Mutex<DebounceGate>>,
    can_run: Arc<AtomicBool>,
    passes: Arc<AtomicUsize>,
    delay: Duration,
}

impl AlarmScheduler {
    pub fn new(ctx: AlmanacContext, cache: Arc<InstancesCache>, host: Arc<dyn AlarmHost>) -> Self {
        Self::with_delay(
            ctx,
            cache,
            host,
            Duration::from_secs(almanac_utils::config::APP_CONFIG.alarm_scheduler_delay),
        )
    }

    pub fn with_delay(
        ctx: AlmanacContext,
        cache: Arc<InstancesCache>,
        host: Arc<dyn AlarmHost>,
        delay: Duration,
    ) -> Self {
        Self {
            ctx,
            cache,
            host,
            gate: Arc::new(Mutex::new(DebounceGate::default())),
            can_run: Arc::new(AtomicBool::new(true)),
            passes: Arc::new(AtomicUsize::new(0)),
            delay,
        }
    }

    /// Stop accepting new work; the current pass completes.
    pub fn stop(&self) {
        self.can_run.store(false, Ordering::SeqCst);
    }

    /// Completed scheduling passes, observable by tests.
    pub fn passes(&self) -> usize {
        self.passes.load(Ordering::SeqCst)
    }

    /// Request a scheduling pass. At most one worker runs; a burst of
    /// requests collapses into a single pass.
    pub fn schedule_next(&self, remove_old: bool) {
        if !self.can_run.load(Ordering::SeqCst) {
            return;
        }
        let spawn = {
            #[allow(clippy::expect_used)]
            let mut gate = self.gate.lock().expect("alarm gate poisoned");
            gate.pending = true;
            gate.remove_pending |= remove_old;
            if gate.running {
                false
            } else {
                gate.running = true;
                true
            }
        };
        if spawn {
            let scheduler = self.clone();
            tokio::spawn(async move {
                scheduler.run_worker().await;
            });
        }
    }

    async fn run_worker(&self) {
        loop {
            // The debounce: a burst of writes lands in one pass
            tokio::time::sleep(self.delay).await;

            let remove_old = {
                #[allow(clippy::expect_used)]
                let mut gate = self.gate.lock().expect("alarm gate poisoned");
                if !gate.pending || !self.can_run.load(Ordering::SeqCst) {
                    gate.running = false;
                    return;
                }
                gate.pending = false;
                std::mem::take(&mut gate.remove_pending)
            };

            let result = self.run_pass(remove_old).await;
            self.passes.fetch_add(1, Ordering::SeqCst);

            if let Err(err) = result {
                // The persisted alarms stay valid; retry the pass
                error!("Alarm scheduling pass failed, rescheduling: {:?}", err);
                #[allow(clippy::expect_used)]
                let mut gate = self.gate.lock().expect("alarm gate poisoned");
                gate.pending = true;
                gate.remove_pending |= remove_old;
            }
        }
    }

    async fn run_pass(&self, remove_old: bool) -> anyhow::Result<()> {
        let now = self.ctx.sys.get_timestamp();
        let now_ms = now.timestamp_millis();

        if remove_old {
            let removed = self.ctx.repos.alerts.delete_scheduled().await?;
            info!(removed, "Removed previously scheduled alerts");
        }

        self.ctx
            .repos
            .alerts
            .purge_stale(now_ms, CLEAR_OLD_ALARM_THRESHOLD_MS)
            .await?;

        let start = now - TimeDelta::milliseconds(SCHEDULE_SLACK_MS);
        let horizon = now + TimeDelta::milliseconds(SCHEDULE_HORIZON_MS);
        self.cache
            .acquire_range(start.timestamp_millis(), horizon.timestamp_millis(), false)
            .await?;

        let due = self
            .ctx
            .repos
            .alerts
            .find_due_reminders(start.timestamp_millis(), horizon.timestamp_millis(), now_ms)
            .await?;

        let mut earliest: Option<DateTime<Utc>> = None;
        let mut scheduled = 0usize;
        for reminder in due {
            match earliest {
                None => earliest = Some(reminder.alarm_time),
                Some(first)
                    if reminder.alarm_time > first + TimeDelta::milliseconds(ALARM_GRACE_MS) =>
                {
                    break;
                }
                Some(_) => {}
            }
            let alert = CalendarAlert::scheduled(
                reminder.event_id.clone(),
                reminder.begin,
                reminder.end,
                reminder.alarm_time,
                reminder.minutes,
                now,
            );
            self.ctx.repos.alerts.insert(&alert).await?;
            self.host.fire_at(reminder.alarm_time);
            scheduled += 1;
        }

        match earliest {
            Some(first) => {
                info!(scheduled, alarm_time = %first, "Scheduled reminder alarms");
                self.host
                    .schedule_check_at(first + TimeDelta::milliseconds(ALARM_GRACE_MS));
            }
            None => {
                self.host
                    .schedule_check_at(now + TimeDelta::milliseconds(SCHEDULE_HORIZON_MS));
            }
        }
        Ok(())
    }
}
