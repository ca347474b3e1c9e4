//! Tracing setup for binaries. Library code only emits events; the binary installs the subscriber.

use tracing::subscriber::set_global_default;
use tracing::Subscriber;
use tracing_subscriber::{fmt, layer::SubscriberExt, EnvFilter, Registry};

/// Builds a subscriber that writes human-readable events to stderr.
///
/// Filtering follows `RUST_LOG`; when unset, `fallback_filter` applies (e.g. `"info"`).
pub fn get_subscriber(fallback_filter: &str) -> impl Subscriber + Send + Sync {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_filter));
    Registry::default()
        .with(env_filter)
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
}

/// Installs `subscriber` as the global default. Call once, at startup.
pub fn init_subscriber(subscriber: impl Subscriber + Send + Sync) -> Result<(), TelemetryError> {
    set_global_default(subscriber).map_err(|e| TelemetryError(e.to_string()))
}

#[derive(Debug, thiserror::Error)]
#[error("failed to install tracing subscriber: {0}")]
pub struct TelemetryError(String);
