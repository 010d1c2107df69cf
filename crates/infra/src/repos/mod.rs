mod alert;
mod attendee;
mod calendar;
mod event;
mod extended_property;
mod instance;
mod properties;
mod reminder;
mod shared;

use std::{sync::Arc, time::Duration};

pub use alert::{DueReminder, IAlertRepo};
use alert::SqliteAlertRepo;
pub use attendee::IAttendeeRepo;
use attendee::SqliteAttendeeRepo;
pub use calendar::ICalendarRepo;
use calendar::SqliteCalendarRepo;
pub use event::IEventRepo;
use event::SqliteEventRepo;
pub use extended_property::IExtendedPropertyRepo;
use extended_property::SqliteExtendedPropertyRepo;
pub use instance::IInstanceRepo;
use instance::SqliteInstanceRepo;
pub use properties::{
    IPropertiesRepo,
    InstancesWindow,
    TIMEZONE_DATABASE_VERSION_KEY,
    TIMEZONE_INSTANCES_KEY,
    TIMEZONE_INSTANCES_PREVIOUS_KEY,
    TIMEZONE_PREVIOUS_SENTINEL,
    TIMEZONE_TYPE_KEY,
    TimezoneType,
};
use properties::SqlitePropertiesRepo;
pub use reminder::IReminderRepo;
use reminder::SqliteReminderRepo;
use shared::state_cache::StateCache;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use tracing::info;

pub(crate) fn connect_url(path: &str) -> String {
    format!("sqlite://{}?mode=rwc", path)
}

#[derive(Clone)]
pub struct Repos {
    pub calendars: Arc<dyn ICalendarRepo>,
    pub events: Arc<dyn IEventRepo>,
    pub instances: Arc<dyn IInstanceRepo>,
    pub reminders: Arc<dyn IReminderRepo>,
    pub alerts: Arc<dyn IAlertRepo>,
    pub attendees: Arc<dyn IAttendeeRepo>,
    pub extended_properties: Arc<dyn IExtendedPropertyRepo>,
    pub properties: Arc<dyn IPropertiesRepo>,
}

impl Repos {
    pub async fn create_sqlite(database_path: &str) -> anyhow::Result<Self> {
        info!("DB OPENING {} ...", database_path);
        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));
        let pool = SqlitePoolOptions::new()
            .max_connections(almanac_utils::config::APP_CONFIG.db.max_connections)
            .connect_with(options)
            .await?;
        info!("DB OPENING {} ... [done]", database_path);

        if !almanac_utils::config::APP_CONFIG.db.skip_migrations {
            info!("DB EXECUTING MIGRATION ...");
            sqlx::migrate!().run(&pool).await?;
            info!("DB EXECUTING MIGRATION ... [done]");
        } else {
            info!("DB MIGRATION SKIPPED");
        }

        // Read-through cache of the metadata row and the key/value cache
        // table, shared so the instance writer can invalidate it in the
        // same mutation path
        let state_cache = Arc::new(StateCache::new());

        Ok(Self {
            calendars: Arc::new(SqliteCalendarRepo::new(pool.clone())),
            events: Arc::new(SqliteEventRepo::new(pool.clone())),
            instances: Arc::new(SqliteInstanceRepo::new(
                pool.clone(),
                state_cache.clone(),
            )),
            reminders: Arc::new(SqliteReminderRepo::new(pool.clone())),
            alerts: Arc::new(SqliteAlertRepo::new(pool.clone())),
            attendees: Arc::new(SqliteAttendeeRepo::new(pool.clone())),
            extended_properties: Arc::new(SqliteExtendedPropertyRepo::new(pool.clone())),
            properties: Arc::new(SqlitePropertiesRepo::new(pool, state_cache)),
        })
    }
}
