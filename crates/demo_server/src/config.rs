//! Demo server configuration

use serde::{Deserialize, Serialize};
use telemetry::TelemetryConfig;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Tracing pipeline configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind to
    #[serde(default = "default_port")]
    pub port: u16,

    /// Seconds allowed for in-flight connections after the stop signal
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,

    /// Timeout in seconds for draining buffered spans at teardown
    #[serde(default = "default_drain_timeout_secs")]
    pub telemetry_drain_timeout_secs: u64,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8080
}

const fn default_shutdown_timeout_secs() -> u64 {
    10
}

const fn default_drain_timeout_secs() -> u64 {
    5
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            telemetry_drain_timeout_secs: default_drain_timeout_secs(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file and environment
    ///
    /// Reads `config.*` from the working directory if present, then applies
    /// `DEMO`-prefixed environment variables (e.g. `DEMO__SERVER__PORT`,
    /// `DEMO__TELEMETRY__ENDPOINT`). The double underscore separates
    /// nesting levels so keys like `service_name` survive.
    pub fn load() -> Result<Self, config::ConfigError> {
        let builder = config::Config::builder()
            // Start with defaults
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080)?
            .set_default("telemetry.service_name", "demo-server")?
            .set_default("telemetry.service_version", env!("CARGO_PKG_VERSION"))?
            // Local collectors usually run without certificates
            .set_default("telemetry.tls", false)?
            // Load from file if exists
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("DEMO")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }
}
