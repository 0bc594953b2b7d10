//! Route definitions

use axum::{Router, routing::get};
use telemetry::RequestTraceLayer;

use crate::{handlers, state::AppState};

/// Create the main router with all routes
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoint
        .route("/health", get(handlers::health::health_check))
        // Tracing demos
        .route("/manual-trace", get(handlers::trace_demo::manual_trace))
        .route("/api/users", get(handlers::trace_demo::get_user))
        // Every route passes through the tracing middleware
        .layer(RequestTraceLayer::new(state.tracer.clone()))
        // Attach state
        .with_state(state)
}
