//! Telemetry error types

use std::time::Duration;

/// Error type for telemetry setup and teardown
#[derive(Debug, thiserror::Error)]
pub enum TelemetryError {
    /// Collector endpoint was rejected before any state was touched
    #[error("Invalid collector endpoint `{endpoint}`: {reason}")]
    InvalidEndpoint {
        /// The rejected endpoint value
        endpoint: String,
        /// Why it was rejected
        reason: String,
    },

    /// Failed to create the OTLP exporter
    #[error("Failed to create OTLP exporter: {0}")]
    Exporter(String),

    /// Failed to flush buffered spans
    #[error("Failed to flush spans: {0}")]
    Flush(String),

    /// Draining the tracer provider failed for a non-timeout reason
    #[error("Failed to shut down tracer provider: {0}")]
    Shutdown(String),

    /// The drain missed its deadline; remaining buffered spans were abandoned
    #[error("Tracer provider shutdown timed out after {0:?}")]
    ShutdownTimeout(Duration),
}
