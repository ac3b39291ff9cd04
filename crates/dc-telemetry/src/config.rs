//! Telemetry configuration from environment variables.

use std::env;

/// Logging configuration for a validator process.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,

    /// Local validator id, empty when not yet known
    pub validator_id: String,

    /// Filter directive (trace, debug, info, warn, error or a full EnvFilter string)
    pub log_level: String,

    /// Whether to emit JSON formatted logs
    pub json_logs: bool,

    /// Whether to use ANSI colours in plain output
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "docket-chain".to_string(),
            validator_id: String::new(),
            log_level: "info".to_string(),
            json_logs: false,
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `DC_SERVICE_NAME`: Service name (default: docket-chain)
    /// - `DC_VALIDATOR_ID`: Local validator id (default: empty)
    /// - `DC_LOG_LEVEL` or `RUST_LOG`: Filter directive (default: info)
    /// - `DC_JSON_LOGS`: Enable JSON logs (default: false in dev, true in containers)
    pub fn from_env() -> Self {
        let is_container =
            env::var("KUBERNETES_SERVICE_HOST").is_ok() || env::var("DOCKER_CONTAINER").is_ok();
        let json_logs = env::var("DC_JSON_LOGS")
            .map(|v| parse_flag(&v))
            .unwrap_or(is_container);

        Self {
            service_name: env::var("DC_SERVICE_NAME")
                .unwrap_or_else(|_| "docket-chain".to_string()),
            validator_id: env::var("DC_VALIDATOR_ID").unwrap_or_default(),
            log_level: env::var("DC_LOG_LEVEL")
                .or_else(|_| env::var("RUST_LOG"))
                .unwrap_or_else(|_| "info".to_string()),
            json_logs,
            ansi: !json_logs,
        }
    }

    /// Configuration for one validator, other fields from the environment.
    pub fn for_validator(validator_id: &str) -> Self {
        let mut config = Self::from_env();
        config.validator_id = validator_id.to_string();
        config
    }

    /// Service name including the validator id.
    pub fn full_service_name(&self) -> String {
        if self.validator_id.is_empty() {
            self.service_name.clone()
        } else {
            format!("{}-{}", self.service_name, self.validator_id)
        }
    }
}

fn parse_flag(value: &str) -> bool {
    value.eq_ignore_ascii_case("true") || value == "1"
}
