//! Handlers demonstrating manual span creation
//!
//! Spans opened here parent under the request span installed by the
//! tracing middleware, with simulated downstream work standing in for
//! real dependencies.

use std::time::Duration;

use axum::{
    Extension,
    extract::{Query, State},
};
use opentelemetry::{
    Context as OtelContext, KeyValue,
    trace::{Span, TraceContextExt, Tracer, TracerProvider as _},
};
use serde::Deserialize;
use telemetry::RequestContext;

use crate::state::AppState;

/// Query parameters for the user demo endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct UserQuery {
    /// User identifier recorded on the span
    pub id: Option<String>,
}

/// Span context of the surrounding request, or the ambient context
fn parent_context(context: Option<Extension<RequestContext>>) -> OtelContext {
    context.map_or_else(OtelContext::current, |Extension(request)| request.0)
}

/// Span opened through a dedicated tracer, outside the shared handler tracer
pub async fn manual_trace(
    State(state): State<AppState>,
    context: Option<Extension<RequestContext>>,
) -> &'static str {
    let parent = parent_context(context);
    let tracer = state.tracer_provider.tracer("manual-example");
    let mut span = tracer.start_with_context("manual-operation", &parent);
    span.set_attribute(KeyValue::new("example.key", "example-value"));

    tokio::time::sleep(Duration::from_millis(100)).await;

    span.end();
    "manual trace recorded\n"
}

/// User lookup recording a span tree of simulated downstream calls
pub async fn get_user(
    State(state): State<AppState>,
    Query(query): Query<UserQuery>,
    context: Option<Extension<RequestContext>>,
) -> &'static str {
    let parent = parent_context(context);
    let span = state
        .tracer
        .span_builder("process-user-request")
        .with_attributes([
            KeyValue::new(
                "user.id",
                query.id.unwrap_or_else(|| "anonymous".to_string()),
            ),
            KeyValue::new("request.type", "user-info"),
        ])
        .start_with_context(&state.tracer, &parent);
    let cx = parent.with_span(span);

    query_database(&state, &cx).await;
    process_user_data(&state, &cx).await;

    cx.span().end();
    "user request processed\n"
}

/// Simulated database query recorded as a child span
async fn query_database(state: &AppState, parent: &OtelContext) {
    let mut span = state.tracer.start_with_context("database-query", parent);
    tokio::time::sleep(Duration::from_millis(200)).await;
    span.end();
}

/// Simulated post-processing recorded as a child span
async fn process_user_data(state: &AppState, parent: &OtelContext) {
    let mut span = state.tracer.start_with_context("process-user-data", parent);
    tokio::time::sleep(Duration::from_millis(150)).await;
    span.end();
}
