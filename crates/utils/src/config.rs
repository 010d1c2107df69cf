use std::sync::LazyLock;

use config::Config;
use serde::Deserialize;

/// Application configuration (main)
#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct AppConfig {
    /// The tokio runtime flavour, "multi_thread" or "current_thread"
    /// Default is "multi_thread"
    /// Env var: ALMANAC__TOKIO_RUNTIME
    pub tokio_runtime: String,

    /// Database config
    pub db: DbConfig,

    /// This is a flag for disabling the background alarm scheduling job
    /// Be careful, as alarms recorded in the database will then never fire
    ///
    /// Default is false
    /// Env var: ALMANAC__DISABLE_ALARM_JOB
    pub disable_alarm_job: bool,

    /// Delay in seconds between an alarm scheduling request and the pass
    /// that serves it. A burst of writes inside this delay produces a
    /// single pass.
    /// Default is 5 seconds
    /// Env var: ALMANAC__ALARM_SCHEDULER_DELAY
    pub alarm_scheduler_delay: u64,

    /// The minimum span in days that the instances cache materializes when
    /// it has to (re)build from scratch. Small acquired ranges are widened
    /// to at least this span so that scrolling a month view does not
    /// trigger an expansion per day.
    /// Default is 62 days
    /// Env var: ALMANAC__MINIMUM_EXPANSION_SPAN_DAYS
    pub minimum_expansion_span_days: i64,
}

/// Database configuration
#[derive(Debug, Deserialize)]
#[allow(unused)]
pub struct DbConfig {
    /// Path of the SQLite database file
    /// Default is calendar.db in the working directory
    /// Env var: ALMANAC__DB__PATH
    pub path: String,

    /// This is a flag to skip the database migration
    /// Default is false
    /// Env var: ALMANAC__DB__SKIP_MIGRATIONS
    pub skip_migrations: bool,

    /// The maximum number of connections to the database
    /// Default is 5
    /// Env var: ALMANAC__DB__MAX_CONNECTIONS
    pub max_connections: u32,
}

/// Parse the configuration from the environment variables
/// and return the configuration object
///
/// This function will panic if the configuration is not valid !
///
/// This is called by the `APP_CONFIG` global variable (lazy)
fn parse_config() -> AppConfig {
    #[allow(clippy::expect_used)]
    let config = Config::builder()
        .add_source(
            config::Environment::with_prefix("ALMANAC")
                .try_parsing(true)
                .separator("__"),
        )
        .set_default("tokio_runtime", "multi_thread")
        .expect("Failed to set default tokio_runtime")
        .set_default("db.path", "calendar.db")
        .expect("Failed to set default db.path")
        .set_default("db.skip_migrations", false)
        .expect("Failed to set default db.skip_migrations")
        .set_default("db.max_connections", 5)
        .expect("Failed to set default db.max_connections")
        .set_default("disable_alarm_job", false)
        .expect("Failed to set default disable_alarm_job")
        .set_default("alarm_scheduler_delay", 5)
        .expect("Failed to set default alarm_scheduler_delay")
        .set_default("minimum_expansion_span_days", 62)
        .expect("Failed to set default minimum_expansion_span_days")
        .build()
        .expect("Failed to build the configuration object");

    #[allow(clippy::expect_used)]
    let config = config
        .try_deserialize()
        .expect("Failed to deserialize the configuration object");

    config
}

// This is a global variable that will be initialized once
// and will be available throughout the application
// Using global variable is bad practice, but for **immutable** environment variables
// it is acceptable
pub static APP_CONFIG: LazyLock<AppConfig> = LazyLock::new(parse_config);
