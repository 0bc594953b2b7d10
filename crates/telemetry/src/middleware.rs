//! Request tracing middleware for HTTP services
//!
//! Opens a server span for every incoming request, exposes its context to
//! handlers through request extensions, and ends the span on every exit
//! path including handler errors and dropped requests.

use axum::{body::Body, extract::Request, response::Response};
use std::{
    future::Future,
    pin::Pin,
    task::{Context, Poll},
};

use opentelemetry::{
    Context as OtelContext, KeyValue,
    trace::{SpanKind, Status, TraceContextExt, Tracer},
};
use opentelemetry_sdk::trace::Tracer as SdkTracer;
use tower::{Layer, Service};

/// Layer that opens a server span around each HTTP request
#[derive(Clone)]
pub struct RequestTraceLayer {
    tracer: SdkTracer,
}

impl RequestTraceLayer {
    /// Create a tracing layer recording through the given tracer
    #[must_use]
    pub const fn new(tracer: SdkTracer) -> Self {
        Self { tracer }
    }
}

impl std::fmt::Debug for RequestTraceLayer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTraceLayer").finish_non_exhaustive()
    }
}

impl<S> Layer<S> for RequestTraceLayer {
    type Service = RequestTraceService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        RequestTraceService {
            inner,
            tracer: self.tracer.clone(),
        }
    }
}

/// Service that records a span for each request passing through
#[derive(Clone)]
pub struct RequestTraceService<S> {
    inner: S,
    tracer: SdkTracer,
}

impl<S> std::fmt::Debug for RequestTraceService<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestTraceService").finish_non_exhaustive()
    }
}

impl<S> Service<Request<Body>> for RequestTraceService<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + 'static,
    S::Future: Send,
{
    type Response = S::Response;
    type Error = S::Error;
    type Future = Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, mut request: Request<Body>) -> Self::Future {
        let method = request.method().to_string();
        // Query strings stay out of the span name and target.
        let path = request.uri().path().to_string();

        // The span starts here rather than inside the future, so a request
        // dropped before its first poll still ends it.
        let parent = OtelContext::new();
        let span = self
            .tracer
            .span_builder(format!("{method} {path}"))
            .with_kind(SpanKind::Server)
            .with_attributes([
                KeyValue::new("http.method", method),
                KeyValue::new("http.target", path),
            ])
            .start_with_context(&self.tracer, &parent);
        let cx = parent.with_span(span);

        // Handlers pick the context up from extensions to parent their own
        // spans under this request.
        request.extensions_mut().insert(RequestContext(cx.clone()));

        let mut inner = self.inner.clone();

        Box::pin(async move {
            let result = inner.call(request).await;

            match &result {
                Ok(response) => {
                    cx.span().set_attribute(KeyValue::new(
                        "http.status_code",
                        i64::from(response.status().as_u16()),
                    ));
                },
                Err(_) => {
                    cx.span().set_status(Status::error("request handler failed"));
                },
            }
            cx.span().end();

            result
        })
    }
}

/// Span context of the surrounding request, stored in request extensions
#[derive(Clone)]
pub struct RequestContext(pub OtelContext);

impl RequestContext {
    /// Context carrying the request's server span
    #[must_use]
    pub fn context(&self) -> OtelContext {
        self.0.clone()
    }
}

impl std::fmt::Debug for RequestContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestContext").finish_non_exhaustive()
    }
}
