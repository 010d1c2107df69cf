mod repos;
mod system;

use std::sync::Arc;

pub use repos::{
    DueReminder,
    InstancesWindow,
    Repos,
    TIMEZONE_DATABASE_VERSION_KEY,
    TIMEZONE_INSTANCES_KEY,
    TIMEZONE_INSTANCES_PREVIOUS_KEY,
    TIMEZONE_PREVIOUS_SENTINEL,
    TIMEZONE_TYPE_KEY,
    TimezoneType,
};
use sqlx::sqlite::SqlitePoolOptions;
pub use system::{ISys, RealSys};

/// The context for the application
/// Contains the repositories, configuration, and system
///
/// System is abstracted to allow for testing
#[derive(Clone)]
pub struct AlmanacContext {
    pub repos: Repos,
    pub sys: Arc<dyn ISys>,
}

/// The parameters to create the context
struct ContextParams {
    pub database_path: String,
}

impl AlmanacContext {
    async fn create(params: ContextParams) -> anyhow::Result<Self> {
        let repos = Repos::create_sqlite(&params.database_path).await?;
        Ok(Self {
            repos,
            sys: Arc::new(RealSys {}),
        })
    }
}

/// Will setup the infrastructure context given the environment
pub async fn setup_context() -> anyhow::Result<AlmanacContext> {
    AlmanacContext::create(ContextParams {
        database_path: almanac_utils::config::APP_CONFIG.db.path.clone(),
    })
    .await
}

/// Setup the infrastructure context against an explicit database path.
/// Tests use this with a throwaway file so they can run in parallel.
pub async fn setup_context_with_path(path: &str) -> anyhow::Result<AlmanacContext> {
    AlmanacContext::create(ContextParams {
        database_path: path.to_string(),
    })
    .await
}

/// Setup a context against a throwaway database file, so tests can run in
/// parallel without sharing state.
#[cfg(test)]
pub(crate) async fn setup_test_context() -> anyhow::Result<AlmanacContext> {
    let path = std::env::temp_dir().join(format!("almanac-test-{}.db", uuid::Uuid::new_v4()));
    setup_context_with_path(&path.to_string_lossy()).await
}

/// Run the migrations
///
/// This is not run by the application itself, but is provided as a utility
pub async fn run_migration() -> anyhow::Result<()> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(&repos::connect_url(
            &almanac_utils::config::APP_CONFIG.db.path,
        ))
        .await?;

    sqlx::migrate!().run(&pool).await.map_err(|e| e.into())
}
