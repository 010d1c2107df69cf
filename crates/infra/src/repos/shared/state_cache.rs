use std::time::Duration;

use moka::future::Cache;

use super::super::properties::InstancesWindow;

/// Process-local read-through cache of the one-row metadata record and the
/// key/value cache table. Writers invalidate the affected entry in the same
/// mutation path that commits the row, so readers never observe state older
/// than the last commit.
pub(crate) struct StateCache {
    pub values: Cache<String, Option<String>>,
    pub window: Cache<(), InstancesWindow>,
}

impl StateCache {
    pub fn new() -> Self {
        Self {
            values: Cache::builder()
                .time_to_live(Duration::from_secs(300)) // 5 minutes
                .build(),
            window: Cache::builder()
                .time_to_live(Duration::from_secs(300)) // 5 minutes
                .build(),
        }
    }

    pub async fn invalidate_window(&self) {
        self.window.invalidate(&()).await;
    }

    pub async fn invalidate_value(&self, key: &str) {
        self.values.invalidate(key).await;
    }
}
