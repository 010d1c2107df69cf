use tracing_subscriber::{EnvFilter, Registry, layer::SubscriberExt};

/// Register a subscriber as global default to process span data.
///
/// It should only be called once!
pub fn init_subscriber() -> anyhow::Result<()> {
    // Filter the spans that are shown based on the RUST_LOG env var or the
    // default value ("info")
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // If the binary is compiled in debug mode (aka for development)
    // use the compact format for logs
    if cfg!(debug_assertions) {
        tracing_subscriber::fmt()
            .compact()
            .with_env_filter(env_filter)
            .init();
    } else {
        // In production, use the JSON format for logs
        let subscriber = Registry::default().with(env_filter).with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false),
        );

        // Set the global subscriber
        tracing::subscriber::set_global_default(subscriber)?;
    }
    Ok(())
}
