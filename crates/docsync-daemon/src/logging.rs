use docsync_core::LoggingConfig;
use tracing_subscriber::{filter::EnvFilter, layer::SubscriberExt, Registry};

/// Filter from `RUST_LOG`, falling back to the configured level.
pub fn env_filter(config: &LoggingConfig, verbose: bool) -> EnvFilter {
    if verbose {
        return EnvFilter::new("debug");
    }
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level))
}

/// Install the global subscriber. Later calls are ignored.
pub fn init_logging(config: &LoggingConfig, verbose: bool) {
    let filter = env_filter(config, verbose);

    match config.format.as_str() {
        "json" => {
            let subscriber = Registry::default()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json());
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        "compact" => {
            let subscriber = Registry::default()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().compact());
            tracing::subscriber::set_global_default(subscriber).ok();
        }
        _ => {
            let subscriber = Registry::default()
                .with(filter)
                .with(tracing_subscriber::fmt::layer());
            tracing::subscriber::set_global_default(subscriber).ok();
        }
    }
}
