//! vidlog HTTP server: configuration, the chat-completions oracle, and the
//! top-level router.

pub mod config;
pub mod oracle;

use axum::Router;
use tower_http::trace::TraceLayer;
use vidlog_api::ApiState;
use vidlog_core::{oracle::ExtractionOracle, store::TrackerStore};

/// The API mounted under `/api`, with request tracing.
pub fn app<S, O>(state: ApiState<S, O>) -> Router
where
  S: TrackerStore + 'static,
  O: ExtractionOracle + 'static,
{
  Router::new()
    .nest("/api", vidlog_api::api_router(state))
    .layer(TraceLayer::new_for_http())
}
