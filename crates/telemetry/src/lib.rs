//! Distributed tracing over OTLP
//!
//! Wires service code to an OpenTelemetry collector: configuration,
//! one-call pipeline setup, an owning provider handle with bounded
//! shutdown, and tower middleware that spans incoming HTTP requests.

pub mod config;
pub mod error;
pub mod middleware;
pub mod provider;

pub use config::{AttributeValue, SamplingPolicy, TelemetryConfig};
pub use error::TelemetryError;
pub use middleware::{RequestContext, RequestTraceLayer, RequestTraceService};
pub use provider::{TelemetryProvider, init_telemetry};
