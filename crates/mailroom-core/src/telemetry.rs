//! Logging setup
//!
//! Library code only emits `tracing` events; binaries call
//! [`init_telemetry`] once to install a subscriber.

use crate::error::{Error, Result};
use tracing_subscriber::EnvFilter;

/// Telemetry configuration
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Service name attached to the startup event
    pub service_name: String,
    /// Log level filter used when `RUST_LOG` is unset
    pub log_level: String,
    /// Whether to emit ANSI colors
    pub ansi: bool,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: "mailroom".to_string(),
            log_level: "info".to_string(),
            ansi: true,
        }
    }
}

impl TelemetryConfig {
    /// Create a new configuration with the given service name
    pub fn new(service_name: impl Into<String>) -> Self {
        Self {
            service_name: service_name.into(),
            ..Default::default()
        }
    }

    /// Set the log level filter
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Disable ANSI colors
    pub fn without_ansi(mut self) -> Self {
        self.ansi = false;
        self
    }

    /// Create from environment variables
    ///
    /// Reads:
    /// - `MAILROOM_SERVICE_NAME`: Service name (default: "mailroom")
    /// - `RUST_LOG`: Log level filter (default: "info")
    /// - `NO_COLOR`: Disables ANSI colors when set
    pub fn from_env() -> Self {
        let service_name =
            std::env::var("MAILROOM_SERVICE_NAME").unwrap_or_else(|_| "mailroom".to_string());

        let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());

        let ansi = std::env::var_os("NO_COLOR").is_none();

        Self {
            service_name,
            log_level,
            ansi,
        }
    }
}

/// Install a `tracing` subscriber writing formatted events to stderr
///
/// `RUST_LOG` takes precedence over `config.log_level`. Fails if a global
/// subscriber is already installed.
pub fn init_telemetry(config: TelemetryConfig) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| Error::Internal {
            reason: format!("failed to initialize tracing subscriber: {}", e),
        })?;

    tracing::debug!(service = %config.service_name, "Telemetry initialized");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_telemetry_config_default() {
        let config = TelemetryConfig::default();
        assert_eq!(config.service_name, "mailroom");
        assert_eq!(config.log_level, "info");
        assert!(config.ansi);
    }

    #[test]
    fn test_telemetry_config_builder() {
        let config = TelemetryConfig::new("test-service")
            .with_log_level("debug")
            .without_ansi();

        assert_eq!(config.service_name, "test-service");
        assert_eq!(config.log_level, "debug");
        assert!(!config.ansi);
    }
}
