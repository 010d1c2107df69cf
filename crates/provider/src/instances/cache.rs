//! The persistent instances cache: which UTC window is materialized, in
//! which zone, and how to get more of it.

use almanac_domain::CalendarEvent;
use almanac_infra::{
    AlmanacContext,
    InstancesWindow,
    TIMEZONE_INSTANCES_KEY,
    TIMEZONE_INSTANCES_PREVIOUS_KEY,
    TIMEZONE_PREVIOUS_SENTINEL,
    TIMEZONE_TYPE_KEY,
    TimezoneType,
};
use chrono_tz::Tz;
use tracing::{info, instrument};

use super::materializer::{MAX_ASSUMED_DURATION_MS, materialize_window};

pub struct InstancesCache {
    ctx: AlmanacContext,
    /// Serializes overlapping expansions; a second caller re-checks the
    /// window after taking it and may return without work.
    expansion_lock: tokio::sync::Mutex<()>,
}

fn minimum_expansion_span_ms() -> i64 {
    almanac_utils::config::APP_CONFIG.minimum_expansion_span_days * 24 * 60 * 60 * 1000
}

/// Widen a requested range so a fresh materialization covers a useful span
/// instead of a sliver.
fn widen(begin: i64, end: i64) -> (i64, i64) {
    let span = minimum_expansion_span_ms();
    let missing = span - (end - begin);
    if missing <= 0 {
        return (begin, end);
    }
    let pad = missing / 2;
    (begin - pad, end + missing - pad)
}

impl InstancesCache {
    pub fn new(ctx: AlmanacContext) -> Self {
        Self {
            ctx,
            expansion_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// The zone instances materialize in right now, updating the stored
    /// zone when AUTO mode notices the device moved. Returns the zone and
    /// whether it changed.
    async fn effective_timezone(&self) -> anyhow::Result<(Tz, bool)> {
        let properties = &self.ctx.repos.properties;
        let timezone_type = properties
            .get(TIMEZONE_TYPE_KEY)
            .await?
            .map(TimezoneType::try_from)
            .transpose()?
            .unwrap_or(TimezoneType::Auto);
        let stored = properties
            .get(TIMEZONE_INSTANCES_KEY)
            .await?
            .and_then(|s| s.parse::<Tz>().ok());

        let effective = match timezone_type {
            TimezoneType::Home => match stored {
                Some(home) => home,
                None => self.ctx.sys.device_timezone(),
            },
            TimezoneType::Auto => self.ctx.sys.device_timezone(),
        };

        let changed = stored != Some(effective);
        if changed {
            properties
                .set(TIMEZONE_INSTANCES_KEY, effective.name())
                .await?;
            if timezone_type == TimezoneType::Auto {
                // First adoption of a real zone replaces the GMT sentinel
                let previous = properties.get(TIMEZONE_INSTANCES_PREVIOUS_KEY).await?;
                if previous.as_deref() == Some(TIMEZONE_PREVIOUS_SENTINEL) {
                    properties
                        .set(TIMEZONE_INSTANCES_PREVIOUS_KEY, effective.name())
                        .await?;
                }
            }
        }
        Ok((effective, changed))
    }

    /// Guarantee that `[begin, end]` (epoch ms) is materialized when this
    /// returns. Rebuilds from scratch on an empty cache, a timezone change
    /// or `force_rebuild`; otherwise extends only the uncovered side(s).
    #[instrument(skip(self))]
    pub async fn acquire_range(
        &self,
        begin: i64,
        end: i64,
        force_rebuild: bool,
    ) -> anyhow::Result<()> {
        if end < begin {
            return Err(anyhow::anyhow!("Invalid range: {}..{}", begin, end));
        }
        let _guard = self.expansion_lock.lock().await;

        let (timezone, timezone_changed) = self.effective_timezone().await?;
        let window = self.ctx.repos.properties.window().await?;

        if window.is_empty()
            || timezone_changed
            || window.local_timezone != timezone
            || force_rebuild
        {
            let (wide_begin, wide_end) = widen(begin, end);
            info!(
                begin = wide_begin,
                end = wide_end,
                timezone = timezone.name(),
                "Rebuilding instances cache"
            );
            let instances =
                materialize_window(&self.ctx, wide_begin, wide_end, &timezone).await?;
            self.ctx
                .repos
                .instances
                .replace_window(
                    &instances,
                    &InstancesWindow {
                        local_timezone: timezone,
                        min_instance: wide_begin,
                        max_instance: wide_end,
                    },
                )
                .await?;
            return Ok(());
        }

        if window.covers(begin, end) {
            return Ok(());
        }

        let (wide_begin, wide_end) = widen(begin, end);
        let mut instances = Vec::new();
        let new_min = wide_begin.min(window.min_instance);
        let new_max = wide_end.max(window.max_instance);
        if wide_begin < window.min_instance {
            instances.extend(
                materialize_window(&self.ctx, wide_begin, window.min_instance, &timezone)
                    .await?,
            );
        }
        if wide_end > window.max_instance {
            instances.extend(
                materialize_window(&self.ctx, window.max_instance, wide_end, &timezone)
                    .await?,
            );
        }
        info!(
            min = new_min,
            max = new_max,
            added = instances.len(),
            "Extending instances cache window"
        );
        self.ctx
            .repos
            .instances
            .extend_window(
                &instances,
                &InstancesWindow {
                    local_timezone: timezone,
                    min_instance: new_min,
                    max_instance: new_max,
                },
            )
            .await?;
        Ok(())
    }

    /// The zone day-level queries convert Julian days with.
    pub async fn timezone(&self) -> anyhow::Result<Tz> {
        Ok(self.effective_timezone().await?.0)
    }

    /// Forget the materialized window; the next acquire rebuilds.
    pub async fn invalidate(&self) -> anyhow::Result<()> {
        self.ctx.repos.properties.clear_window().await
    }

    /// Whether a changed recurring event or exception can affect the rows
    /// currently cached. Events entirely outside the window cannot, and
    /// skipping the invalidation keeps the cache warm.
    pub async fn event_affects_window(&self, event: &CalendarEvent) -> anyhow::Result<bool> {
        let window = self.ctx.repos.properties.window().await?;
        if window.is_empty() {
            return Ok(false);
        }
        let starts_before_max = event.dtstart.timestamp_millis() <= window.max_instance;
        let lasts_into_window = match event.last_date {
            None => true,
            Some(last) => last.timestamp_millis() >= window.min_instance,
        };
        let original_in_window = event.original_instance_time.is_some_and(|t| {
            let ms = t.timestamp_millis();
            ms >= window.min_instance - MAX_ASSUMED_DURATION_MS && ms <= window.max_instance
        });
        Ok((starts_before_max && lasts_into_window) || original_in_window)
    }
}
