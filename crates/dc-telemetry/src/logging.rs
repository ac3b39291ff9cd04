//! Structured logging setup.
//!
//! Plain output is meant for a terminal; JSON output carries target, file
//! and line so a log shipper can index it without parsing the message.

use crate::{TelemetryConfig, TelemetryError};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Build the filter, preferring `RUST_LOG` when it parses.
pub(crate) fn env_filter(config: &TelemetryConfig) -> Result<EnvFilter, TelemetryError> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .map_err(|e| TelemetryError::Config(e.to_string()))
}

/// Install the global subscriber.
///
/// Fails with [`TelemetryError::AlreadyInitialized`] when another subscriber
/// is already set for the process.
pub fn init_logging(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    let filter = env_filter(config)?;

    if config.json_logs {
        let json_layer = tracing_subscriber::fmt::layer()
            .json()
            .with_target(true)
            .with_file(true)
            .with_line_number(true);
        tracing_subscriber::registry()
            .with(filter)
            .with(json_layer)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    } else {
        let fmt_layer = tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_ansi(config.ansi);
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt_layer)
            .try_init()
            .map_err(|e| TelemetryError::AlreadyInitialized(e.to_string()))?;
    }

    tracing::info!(
        service = %config.full_service_name(),
        json = config.json_logs,
        "[telemetry] Logging initialized"
    );
    Ok(())
}

/// Route logs through the test harness writer.
///
/// Safe to call from every test; only the first call installs a subscriber.
pub fn init_test_logging() {
    let config = TelemetryConfig {
        log_level: std::env::var("DC_LOG_LEVEL").unwrap_or_else(|_| "warn".to_string()),
        ansi: false,
        ..TelemetryConfig::default()
    };
    let Ok(filter) = env_filter(&config) else {
        return;
    };
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_test_writer())
        .try_init();
}
