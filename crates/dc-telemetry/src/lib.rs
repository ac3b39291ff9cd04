//! # Docket-Chain Telemetry
//!
//! Process-level observability bootstrap for a validator.
//!
//! - Structured logging through `tracing-subscriber`, plain or JSON
//! - Prometheus text exposition of every collector the subsystems register
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dc_telemetry::{init_telemetry, TelemetryConfig};
//!
//! fn main() -> Result<(), dc_telemetry::TelemetryError> {
//!     init_telemetry(&TelemetryConfig::for_validator("v1"))?;
//!     // ...
//!     let body = dc_telemetry::encode_metrics()?;
//!     Ok(())
//! }
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DC_LOG_LEVEL` / `RUST_LOG` | `info` | Log filter |
//! | `DC_JSON_LOGS` | `false` (`true` in containers) | JSON output |
//! | `DC_SERVICE_NAME` | `docket-chain` | Service name |
//! | `DC_VALIDATOR_ID` | empty | Local validator id |

mod config;
mod logging;
mod metrics;

pub use config::TelemetryConfig;
pub use logging::{init_logging, init_test_logging};
pub use metrics::{encode_metrics, metrics_content_type};

use thiserror::Error;

/// Telemetry initialization errors
#[derive(Error, Debug)]
pub enum TelemetryError {
    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Global subscriber already set: {0}")]
    AlreadyInitialized(String),

    #[error("Failed to encode metrics: {0}")]
    Metrics(String),
}

/// Initialize logging for the process.
///
/// Metrics need no setup: collectors register themselves on first use.
pub fn init_telemetry(config: &TelemetryConfig) -> Result<(), TelemetryError> {
    logging::init_logging(config)
}
