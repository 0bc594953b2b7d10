//! Tracer provider initialization and lifecycle
//!
//! Builds the resource/exporter/provider pipeline from a [`TelemetryConfig`],
//! installs the global propagation format, and hands back an owning
//! [`TelemetryProvider`] used for everything after startup.

use std::{borrow::Cow, time::Duration};

use opentelemetry::{
    KeyValue, global, propagation::TextMapCompositePropagator, trace::TracerProvider as _,
};
use opentelemetry_otlp::{SpanExporter as OtlpSpanExporter, WithExportConfig};
use opentelemetry_sdk::{
    Resource,
    propagation::{BaggagePropagator, TraceContextPropagator},
    trace::{SdkTracerProvider, SpanExporter, Tracer as SdkTracer},
};
use tracing::{Subscriber, info};
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::registry::LookupSpan;

use crate::{config::TelemetryConfig, error::TelemetryError};

/// Initialize the tracing pipeline
///
/// Builds the OTLP exporter for the configured collector, wraps it in a
/// batching processor, and installs the resulting provider together with a
/// composite trace-context + baggage propagator as process-wide state.
/// This is the one place that touches globals; call it exactly once, during
/// startup, before spawning anything that records spans. Calling it again
/// overwrites the global state of the earlier call.
///
/// The exporter connects lazily, so an unreachable collector does not fail
/// here; it surfaces later through export logs and [`TelemetryProvider::shutdown`].
/// Requires a running Tokio runtime.
///
/// # Example
///
/// ```ignore
/// use telemetry::{TelemetryConfig, init_telemetry};
///
/// #[tokio::main]
/// async fn main() {
///     let config = TelemetryConfig {
///         service_name: "checkout".to_string(),
///         endpoint: "collector.internal:4317".to_string(),
///         ..TelemetryConfig::default()
///     };
///
///     let provider = init_telemetry(config).expect("telemetry must come up");
///     let tracer = provider.tracer("checkout-api");
///     // ... run the application ...
///     provider
///         .shutdown(std::time::Duration::from_secs(5))
///         .await
///         .expect("spans drained");
/// }
/// ```
pub fn init_telemetry(config: TelemetryConfig) -> Result<TelemetryProvider, TelemetryError> {
    let uri = config.collector_uri()?;

    let exporter = OtlpSpanExporter::builder()
        .with_tonic()
        .with_endpoint(uri.clone())
        .with_timeout(config.timeout())
        .build()
        .map_err(|e| TelemetryError::Exporter(e.to_string()))?;

    let provider = build_provider(&config, exporter);
    install_global(&provider);

    info!(
        endpoint = %uri,
        service = %config.service_name,
        environment = %config.environment,
        "Telemetry initialized with OTLP export"
    );

    Ok(TelemetryProvider { provider, config })
}

/// Provider pipeline shared by the OTLP path and test doubles
pub(crate) fn build_provider<E>(config: &TelemetryConfig, exporter: E) -> SdkTracerProvider
where
    E: SpanExporter + Send + Sync + 'static,
{
    SdkTracerProvider::builder()
        .with_batch_exporter(exporter)
        .with_sampler(config.sampling.to_sampler())
        .with_resource(build_resource(config))
        .build()
}

fn build_resource(config: &TelemetryConfig) -> Resource {
    let mut attributes = vec![
        KeyValue::new("service.version", config.service_version.clone()),
        KeyValue::new("environment", config.environment.clone()),
    ];
    attributes.extend(config.attribute_pairs());

    Resource::builder()
        .with_service_name(config.service_name.clone())
        .with_attributes(attributes)
        .build()
}

fn install_global(provider: &SdkTracerProvider) {
    global::set_tracer_provider(provider.clone());

    let propagator = TextMapCompositePropagator::new(vec![
        Box::new(TraceContextPropagator::new()),
        Box::new(BaggagePropagator::new()),
    ]);
    global::set_text_map_propagator(propagator);
}

/// Owning handle over the tracer provider
///
/// Exactly one should exist per process. Hand out tracers through it and
/// call [`shutdown`](Self::shutdown) at teardown; the handle is consumed so
/// the drain can only happen once.
pub struct TelemetryProvider {
    provider: SdkTracerProvider,
    config: TelemetryConfig,
}

impl std::fmt::Debug for TelemetryProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelemetryProvider")
            .field("service", &self.config.service_name)
            .field("endpoint", &self.config.endpoint)
            .finish_non_exhaustive()
    }
}

impl TelemetryProvider {
    /// Named tracer for a logical component
    ///
    /// Never fails; tracers with the same name are interchangeable and all
    /// of them share this provider.
    #[must_use]
    pub fn tracer(&self, name: impl Into<Cow<'static, str>>) -> SdkTracer {
        self.provider.tracer(name)
    }

    /// Clone of the underlying SDK provider
    #[must_use]
    pub fn tracer_provider(&self) -> SdkTracerProvider {
        self.provider.clone()
    }

    /// Configuration this provider was built from
    #[must_use]
    pub const fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Layer bridging `tracing` spans into OpenTelemetry
    ///
    /// Compose it into a `tracing-subscriber` registry at the application's
    /// bootstrap point.
    pub fn tracing_layer<S>(&self) -> OpenTelemetryLayer<S, SdkTracer>
    where
        S: Subscriber + for<'span> LookupSpan<'span>,
    {
        OpenTelemetryLayer::new(self.tracer(self.config.service_name.clone()))
    }

    /// Flush buffered spans to the exporter now
    pub fn force_flush(&self) -> Result<(), TelemetryError> {
        self.provider
            .force_flush()
            .map_err(|e| TelemetryError::Flush(e.to_string()))
    }

    /// Drain buffered spans, waiting at most `deadline`
    ///
    /// Consumes the handle: shut down exactly once, at process teardown.
    /// When the deadline elapses first the drain is abandoned and the
    /// remaining buffered spans are lost, which the returned
    /// [`TelemetryError::ShutdownTimeout`] surfaces.
    pub async fn shutdown(self, deadline: Duration) -> Result<(), TelemetryError> {
        let provider = self.provider;
        // The drain joins the batch worker thread, so it cannot run on the
        // async runtime directly.
        let drain = tokio::task::spawn_blocking(move || provider.shutdown());

        match tokio::time::timeout(deadline, drain).await {
            Ok(Ok(Ok(()))) => Ok(()),
            Ok(Ok(Err(e))) => Err(TelemetryError::Shutdown(e.to_string())),
            Ok(Err(e)) => Err(TelemetryError::Shutdown(e.to_string())),
            Err(_) => Err(TelemetryError::ShutdownTimeout(deadline)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use opentelemetry::{
        Context, Value,
        trace::{Span, SpanId, TraceContextExt, Tracer},
    };
    use opentelemetry_sdk::{
        error::OTelSdkResult,
        trace::{InMemorySpanExporter, SpanData},
    };

    use super::*;

    fn test_provider(config: &TelemetryConfig) -> (TelemetryProvider, InMemorySpanExporter) {
        let exporter = InMemorySpanExporter::default();
        let provider = build_provider(config, exporter.clone());
        (
            TelemetryProvider {
                provider,
                config: config.clone(),
            },
            exporter,
        )
    }

    /// Exporter whose export call blocks, standing in for a collector that
    /// accepts connections but never drains
    #[derive(Debug)]
    struct StallingExporter {
        stall: Duration,
    }

    impl SpanExporter for StallingExporter {
        fn export(
            &self,
            _batch: Vec<SpanData>,
        ) -> impl std::future::Future<Output = OTelSdkResult> + Send {
            let stall = self.stall;
            async move {
                std::thread::sleep(stall);
                Ok(())
            }
        }
    }

    #[test]
    fn init_rejects_scheme_in_endpoint() {
        let config = TelemetryConfig {
            endpoint: "http://localhost:4317".to_string(),
            ..TelemetryConfig::default()
        };
        let err = init_telemetry(config).expect_err("scheme must be rejected");
        assert!(matches!(err, TelemetryError::InvalidEndpoint { .. }));
    }

    #[test]
    fn init_rejects_empty_endpoint() {
        let config = TelemetryConfig {
            endpoint: String::new(),
            ..TelemetryConfig::default()
        };
        let err = init_telemetry(config).expect_err("empty must be rejected");
        assert!(matches!(err, TelemetryError::InvalidEndpoint { .. }));
    }

    #[tokio::test]
    async fn init_with_unreachable_collector_stays_bounded() {
        // A rejected config must leave the global provider untouched.
        // Checked here, before this test installs the real one; the
        // no-op tracer is the only one handing out invalid contexts.
        let rejected = TelemetryConfig {
            endpoint: "http://localhost:4317".to_string(),
            ..TelemetryConfig::default()
        };
        init_telemetry(rejected).expect_err("scheme must be rejected");
        let span = global::tracer("uninstalled").start("rejected-config");
        assert!(
            !span.span_context().is_valid(),
            "failed initialization must not install a global tracer"
        );

        // Nothing listens here; the exporter connects lazily, so
        // initialization succeeds and problems surface on the drain.
        let config = TelemetryConfig {
            endpoint: "127.0.0.1:59997".to_string(),
            tls: false,
            ..TelemetryConfig::default()
        };
        let provider = init_telemetry(config).expect("lazy exporter");

        let mut span = provider.tracer("smoke").start("queued");
        span.end();

        let started = Instant::now();
        let result = provider.shutdown(Duration::from_secs(1)).await;
        assert!(started.elapsed() < Duration::from_secs(3));
        if let Err(e) = result {
            assert!(matches!(
                e,
                TelemetryError::Shutdown(_) | TelemetryError::ShutdownTimeout(_)
            ));
        }
    }

    #[test]
    fn same_name_tracers_both_start_spans() {
        let config = TelemetryConfig::default();
        let (provider, exporter) = test_provider(&config);

        let first = provider.tracer("component");
        let second = provider.tracer("component");
        let mut span = first.start("one");
        span.end();
        let mut span = second.start("two");
        span.end();

        provider.force_flush().expect("flush");
        let spans = exporter.get_finished_spans().expect("finished spans");
        assert_eq!(spans.len(), 2);
    }

    #[test]
    fn span_accepts_heterogeneous_attributes() {
        let config = TelemetryConfig::default();
        let (provider, exporter) = test_provider(&config);

        let mut span = provider.tracer("attrs").start("mixed");
        span.set_attribute(KeyValue::new("label", "value"));
        span.set_attribute(KeyValue::new("enabled", true));
        span.set_attribute(KeyValue::new("count", 42_i64));
        span.set_attribute(KeyValue::new("ratio", 0.5_f64));
        span.end();

        provider.force_flush().expect("flush");
        let spans = exporter.get_finished_spans().expect("finished spans");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].attributes.len(), 4);
        assert!(
            spans[0]
                .attributes
                .iter()
                .any(|kv| kv.key.as_str() == "enabled" && kv.value == Value::Bool(true))
        );
        assert!(
            spans[0]
                .attributes
                .iter()
                .any(|kv| kv.key.as_str() == "count" && kv.value == Value::I64(42))
        );
    }

    #[test]
    fn child_span_records_parent_link() {
        let config = TelemetryConfig::default();
        let (provider, exporter) = test_provider(&config);
        let tracer = provider.tracer("linkage");

        let parent = tracer.start("parent");
        let parent_id = parent.span_context().span_id();
        let cx = Context::current_with_span(parent);
        let mut child = tracer.start_with_context("child", &cx);
        child.end();
        cx.span().end();

        provider.force_flush().expect("flush");
        let spans = exporter.get_finished_spans().expect("finished spans");
        assert_eq!(spans.len(), 2);
        let child_data = spans
            .iter()
            .find(|s| s.name == "child")
            .expect("child exported");
        assert_eq!(child_data.parent_span_id, parent_id);
    }

    #[test]
    fn nested_spans_export_with_linkage() {
        let config = TelemetryConfig::default();
        let (provider, exporter) = test_provider(&config);
        let tracer = provider.tracer("nested");

        let root = tracer.start("level-0");
        let root_id = root.span_context().span_id();
        let cx_root = Context::current_with_span(root);
        let middle = tracer.start_with_context("level-1", &cx_root);
        let middle_id = middle.span_context().span_id();
        let cx_middle = cx_root.with_span(middle);
        let mut leaf = tracer.start_with_context("level-2", &cx_middle);

        // End in reverse order of creation.
        leaf.end();
        cx_middle.span().end();
        cx_root.span().end();

        provider.force_flush().expect("flush");
        let spans = exporter.get_finished_spans().expect("finished spans");
        assert_eq!(spans.len(), 3);

        let by_name = |name: &str| {
            spans
                .iter()
                .find(|s| s.name == name)
                .expect("span exported")
        };
        assert_eq!(by_name("level-2").parent_span_id, middle_id);
        assert_eq!(by_name("level-1").parent_span_id, root_id);
        assert_eq!(by_name("level-0").parent_span_id, SpanId::INVALID);
    }

    #[test]
    fn resource_carries_service_and_custom_attributes() {
        let mut config = TelemetryConfig {
            service_name: "checkout".to_string(),
            service_version: "1.2.0".to_string(),
            environment: "production".to_string(),
            ..TelemetryConfig::default()
        };
        config
            .attributes
            .insert("deployment.region".to_string(), "br-south".into());

        let resource = build_resource(&config);
        assert_eq!(
            resource.get(&"service.name".into()),
            Some(Value::from("checkout"))
        );
        assert_eq!(
            resource.get(&"service.version".into()),
            Some(Value::from("1.2.0"))
        );
        assert_eq!(
            resource.get(&"environment".into()),
            Some(Value::from("production"))
        );
        assert_eq!(
            resource.get(&"deployment.region".into()),
            Some(Value::from("br-south"))
        );
    }

    #[tokio::test]
    async fn shutdown_with_elapsed_deadline_returns_promptly() {
        let config = TelemetryConfig::default();
        let provider = TelemetryProvider {
            provider: build_provider(
                &config,
                StallingExporter {
                    stall: Duration::from_secs(2),
                },
            ),
            config,
        };
        let mut span = provider.tracer("deadline").start("queued");
        span.end();

        let started = Instant::now();
        let result = provider.shutdown(Duration::ZERO).await;
        assert!(matches!(result, Err(TelemetryError::ShutdownTimeout(_))));
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn stalled_drain_surfaces_timeout() {
        let config = TelemetryConfig::default();
        let provider = TelemetryProvider {
            provider: build_provider(
                &config,
                StallingExporter {
                    stall: Duration::from_secs(4),
                },
            ),
            config,
        };
        let mut span = provider.tracer("stall").start("queued");
        span.end();

        let started = Instant::now();
        let deadline = Duration::from_secs(1);
        let result = provider.shutdown(deadline).await;
        assert!(matches!(result, Err(TelemetryError::ShutdownTimeout(d)) if d == deadline));

        let elapsed = started.elapsed();
        assert!(elapsed >= Duration::from_millis(900));
        assert!(elapsed < Duration::from_secs(3));
    }

    #[test]
    fn clean_drain_flushes_queued_spans() {
        let config = TelemetryConfig::default();
        let (provider, exporter) = test_provider(&config);

        let mut span = provider.tracer("drain").start("queued");
        span.end();

        provider.force_flush().expect("flush");
        assert_eq!(exporter.get_finished_spans().expect("spans").len(), 1);
    }

    #[test]
    fn tracing_layer_bridges_tracing_spans() {
        use tracing_subscriber::layer::SubscriberExt;

        let config = TelemetryConfig {
            service_name: "bridge".to_string(),
            ..TelemetryConfig::default()
        };
        let (provider, exporter) = test_provider(&config);

        let subscriber = tracing_subscriber::registry().with(provider.tracing_layer());
        tracing::subscriber::with_default(subscriber, || {
            let span = tracing::info_span!("bridged-work");
            let _entered = span.entered();
        });

        provider.force_flush().expect("flush");
        let spans = exporter.get_finished_spans().expect("finished spans");
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].name, "bridged-work");
    }
}
