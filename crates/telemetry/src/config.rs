//! Tracing pipeline configuration

use std::{collections::BTreeMap, time::Duration};

use opentelemetry::{KeyValue, Value};
use opentelemetry_sdk::trace::Sampler;
use serde::{Deserialize, Serialize};

use crate::error::TelemetryError;

/// Configuration for the tracing pipeline
///
/// An immutable value object: build it once at startup and hand it to
/// [`init_telemetry`](crate::init_telemetry). The defaults describe an
/// unnamed development service exporting to a local collector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TelemetryConfig {
    /// Logical service name reported in the resource
    ///
    /// An empty name is accepted and yields a default-labeled resource.
    #[serde(default = "default_service_name")]
    pub service_name: String,

    /// Service version reported in the resource
    #[serde(default = "default_service_version")]
    pub service_version: String,

    /// Deployment environment (e.g. "development", "production")
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Collector address as `host:port`, without a scheme
    ///
    /// The transport scheme is owned by [`tls`](Self::tls); endpoints that
    /// embed their own scheme are rejected at initialization.
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Encrypt the collector connection (default: true)
    #[serde(default = "default_tls")]
    pub tls: bool,

    /// Extra resource attributes, merged after the built-in ones
    #[serde(default)]
    pub attributes: BTreeMap<String, AttributeValue>,

    /// Sampling policy for new trace roots
    #[serde(default)]
    pub sampling: SamplingPolicy,

    /// Export timeout in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_service_name() -> String {
    "unknown-service".to_string()
}

fn default_service_version() -> String {
    "0.0.1".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_endpoint() -> String {
    "localhost:4317".to_string()
}

const fn default_tls() -> bool {
    true
}

const fn default_timeout_secs() -> u64 {
    5
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            service_name: default_service_name(),
            service_version: default_service_version(),
            environment: default_environment(),
            endpoint: default_endpoint(),
            tls: default_tls(),
            attributes: BTreeMap::new(),
            sampling: SamplingPolicy::default(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl TelemetryConfig {
    /// Export timeout as a Duration
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Full exporter URI, with the scheme derived from the TLS flag
    pub fn collector_uri(&self) -> Result<String, TelemetryError> {
        if self.endpoint.trim().is_empty() {
            return Err(TelemetryError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: "endpoint must not be empty".to_string(),
            });
        }
        if self.endpoint.contains("://") {
            return Err(TelemetryError::InvalidEndpoint {
                endpoint: self.endpoint.clone(),
                reason: "endpoint must be host:port; the scheme is derived from the `tls` flag"
                    .to_string(),
            });
        }

        let scheme = if self.tls { "https" } else { "http" };
        Ok(format!("{scheme}://{}", self.endpoint))
    }

    /// Custom resource attributes as key/value pairs
    #[must_use]
    pub fn attribute_pairs(&self) -> Vec<KeyValue> {
        self.attributes
            .iter()
            .map(|(key, value)| KeyValue::new(key.clone(), Value::from(value.clone())))
            .collect()
    }
}

/// Which trace roots get recorded
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Record every trace
    #[default]
    AlwaysOn,
    /// Record nothing
    AlwaysOff,
    /// Record the given fraction of traces, decided per trace id
    Ratio(f64),
}

impl SamplingPolicy {
    /// Map to the SDK sampler, clamping degenerate ratios
    #[must_use]
    pub fn to_sampler(self) -> Sampler {
        match self {
            Self::AlwaysOn => Sampler::AlwaysOn,
            Self::AlwaysOff => Sampler::AlwaysOff,
            Self::Ratio(ratio) => {
                if ratio >= 1.0 - f64::EPSILON {
                    Sampler::AlwaysOn
                } else if ratio <= 0.0 {
                    Sampler::AlwaysOff
                } else {
                    Sampler::TraceIdRatioBased(ratio)
                }
            },
        }
    }
}

/// A primitive resource attribute value
///
/// Untagged so configuration files can write plain scalars.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttributeValue {
    /// Boolean attribute
    Bool(bool),
    /// Integer attribute
    Int(i64),
    /// Floating-point attribute
    Float(f64),
    /// String attribute
    String(String),
}

impl From<AttributeValue> for Value {
    fn from(value: AttributeValue) -> Self {
        match value {
            AttributeValue::Bool(inner) => Self::Bool(inner),
            AttributeValue::Int(inner) => Self::I64(inner),
            AttributeValue::Float(inner) => Self::F64(inner),
            AttributeValue::String(inner) => Self::String(inner.into()),
        }
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}
