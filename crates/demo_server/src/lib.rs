//! Demo HTTP server exercising the tracing pipeline
//!
//! Small axum application wired to the telemetry crate: traced routes,
//! handlers opening their own spans, and graceful teardown that drains
//! buffered spans.

pub mod config;
pub mod handlers;
pub mod routes;
pub mod server;
pub mod state;

pub use config::{AppConfig, ServerConfig};
pub use server::serve_with_deadline;
pub use state::AppState;
