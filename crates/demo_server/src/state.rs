//! Shared application state

use opentelemetry_sdk::trace::{SdkTracerProvider, Tracer as SdkTracer};

/// Shared state available to all HTTP handlers
#[derive(Clone)]
pub struct AppState {
    /// Tracer used by the request handlers
    pub tracer: SdkTracer,

    /// Provider backing the tracer, for handlers that open their own named tracer
    pub tracer_provider: SdkTracerProvider,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState").finish_non_exhaustive()
    }
}
