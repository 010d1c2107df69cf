pub(crate) mod state_cache;

use chrono::{DateTime, Utc};

/// Convert an epoch-ms column to a `DateTime<Utc>`, failing loudly on
/// corrupt rows.
pub(crate) fn datetime_from_millis(ms: i64) -> anyhow::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms)
        .ok_or_else(|| anyhow::anyhow!("Unable to convert timestamp {} to DateTime", ms))
}
