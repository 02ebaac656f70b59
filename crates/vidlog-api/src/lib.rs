//! JSON REST API for vidlog.
//!
//! Exposes an axum [`Router`] backed by any [`TrackerStore`] and
//! [`ExtractionOracle`]. Log submission is asynchronous: entries are
//! persisted, answered with `202 Accepted`, and processed by the
//! [`IngestQueue`] worker. Auth and TLS are the caller's responsibility;
//! the acting user is read from the `x-actor-id` header.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", vidlog_api::api_router(state))
//! ```

pub mod audit;
pub mod error;
pub mod export;
pub mod imports;
pub mod logs;
pub mod queue;
pub mod sync;
pub mod videos;

#[cfg(test)]
mod tests;

use std::sync::Arc;

use axum::{
  Router,
  http::HeaderMap,
  routing::{get, post},
};
use vidlog_core::{
  oracle::{ExtractionOracle, Extractor},
  settings::PipelineSettings,
  store::TrackerStore,
};

pub use error::ApiError;
pub use queue::IngestQueue;

/// Header naming the user behind a write. Falls back to
/// [`ApiState::default_actor`].
pub const ACTOR_HEADER: &str = "x-actor-id";

// ─── Application state ───────────────────────────────────────────────────────

/// Shared state threaded through all handlers.
pub struct ApiState<S, O> {
  pub store:         Arc<S>,
  pub extractor:     Arc<Extractor<O>>,
  pub settings:      Arc<PipelineSettings>,
  pub queue:         IngestQueue,
  pub default_actor: Arc<str>,
}

// Derived `Clone` would demand `S: Clone` and `O: Clone`.
impl<S, O> Clone for ApiState<S, O> {
  fn clone(&self) -> Self {
    Self {
      store:         self.store.clone(),
      extractor:     self.extractor.clone(),
      settings:      self.settings.clone(),
      queue:         self.queue.clone(),
      default_actor: self.default_actor.clone(),
    }
  }
}

impl<S, O> ApiState<S, O> {
  pub(crate) fn actor(&self, headers: &HeaderMap) -> String {
    headers
      .get(ACTOR_HEADER)
      .and_then(|v| v.to_str().ok())
      .map(str::trim)
      .filter(|v| !v.is_empty())
      .unwrap_or(&*self.default_actor)
      .to_string()
  }
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, O>(state: ApiState<S, O>) -> Router<()>
where
  S: TrackerStore + 'static,
  O: ExtractionOracle + 'static,
{
  Router::new()
    // Videos
    .route("/videos", get(videos::list::<S, O>).post(videos::create::<S, O>))
    .route(
      "/videos/{id}",
      get(videos::get_one::<S, O>)
        .patch(videos::edit::<S, O>)
        .delete(videos::delete_one::<S, O>),
    )
    .route("/videos/{id}/audit", get(videos::audit_trail::<S, O>))
    // Logs
    .route("/logs", get(logs::list::<S, O>).post(logs::submit::<S, O>))
    .route("/logs/{id}", get(logs::get_one::<S, O>))
    .route("/logs/{id}/associate", post(logs::associate::<S, O>))
    // Imports & sync
    .route("/imports", post(imports::upload::<S, O>))
    .route("/imports/latest", get(imports::latest::<S, O>))
    .route("/imports/{id}/rows", get(imports::rows::<S, O>))
    .route("/sync", post(sync::handler::<S, O>))
    // Read-only views
    .route("/export.csv", get(export::handler::<S, O>))
    .route("/audit", get(audit::handler::<S, O>))
    .with_state(state)
}
