mod telemetry;

use std::sync::Arc;

use almanac_infra::setup_context;
use almanac_provider::{CalendarProvider, TracingAlarmHost};
use almanac_utils::config::APP_CONFIG;
use telemetry::init_subscriber;
use tokio::{runtime::Builder, signal};
use tracing::{error, info};

fn main() -> anyhow::Result<()> {
    // Initialize the subscriber for logging & tracing
    init_subscriber()?;

    // Read the environment variable (default to "multi_thread" if not set)
    let runtime_mode = &APP_CONFIG.tokio_runtime;

    let runtime = if runtime_mode == "current_thread" {
        info!("Using single-threaded Tokio runtime.");
        Builder::new_current_thread().enable_all().build()?
    } else if runtime_mode == "multi_thread" {
        info!("Using multi-threaded Tokio runtime.");
        Builder::new_multi_thread().enable_all().build()?
    } else {
        error!(
            "Invalid value for `tokio_runtime` in the configuration: {} - defaulting to `multi_thread`",
            runtime_mode
        );
        Builder::new_multi_thread().enable_all().build()?
    };

    runtime.block_on(async_main())?;

    Ok(())
}

async fn async_main() -> anyhow::Result<()> {
    let context = setup_context().await?;
    let provider = CalendarProvider::new(context, Arc::new(TracingAlarmHost));

    // Catch up on anything that should have fired while we were down
    if !APP_CONFIG.disable_alarm_job {
        provider.schedule_next(false);
    }

    info!("almanac provider running on {}", APP_CONFIG.db.path);

    // Listen for SIGINT (Ctrl+C) to shutdown the service
    if let Err(e) = signal::ctrl_c().await {
        error!("[main] Failed to listen for SIGINT: {}", e);
    }
    info!("[shutdown] Received SIGINT, stopping workers...");
    provider.scheduler().stop();

    info!("[shutdown] shutdown complete");

    Ok(())
}
